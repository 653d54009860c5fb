// Operator commands typed on stdin while the loop runs.

use crossbeam_channel::{Receiver, Sender};
use levitate_core::EntityId;
use std::io::BufRead;
use std::thread;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Select(EntityId),
    Remove(EntityId),
    Calibrate,
    Abort,
    Status,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let id = |arg: Option<&str>| -> Result<EntityId, String> {
        let arg = arg.ok_or_else(|| format!("`{verb}` needs an entity id"))?;
        arg.parse().map_err(|_| format!("bad entity id `{arg}`"))
    };
    match verb {
        "select" | "s" => id(words.next()).map(Command::Select),
        "remove" | "rm" => id(words.next()).map(Command::Remove),
        "calibrate" | "cal" => Ok(Command::Calibrate),
        "abort" => Ok(Command::Abort),
        "status" | "" => Ok(Command::Status),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!(
            "unknown command `{other}` (select N, remove N, calibrate, abort, status, quit)"
        )),
    }
}

/// Read stdin lines on a detached thread. End of input counts as `quit`.
pub fn spawn_stdin_reader() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = thread::Builder::new()
        .name("stdin".into())
        .spawn(move || read_lines(std::io::stdin().lock(), &tx));
    if let Err(e) = spawned {
        log::warn!("stdin commands unavailable: {e}");
    }
    rx
}

fn read_lines(input: impl BufRead, tx: &Sender<Command>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        match parse(&line) {
            Ok(cmd) => {
                if tx.send(cmd).is_err() {
                    return;
                }
            }
            Err(msg) => log::warn!("{msg}"),
        }
    }
    let _ = tx.send(Command::Quit);
}
