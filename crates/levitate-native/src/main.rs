mod audio;
mod commands;
mod host;
mod link;
mod settings;
mod simulate;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::TryRecvError;
use instant::Instant;
use levitate_core::{
    default_entity_color, default_entity_position, inbox, ControlEngine, EngineConfig,
    EntityConfig, EntityId, ThresholdPolicy,
};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::AudioSink;
use crate::commands::Command;
use crate::host::NativeHost;
use crate::settings::JsonSettings;
use crate::simulate::{spawn_simulator, MoodCell, Simulator, SimulatorConfig};

// Status line interval.
const REPORT_EVERY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "levitate", about = "Lift objects and tones with a concentration signal")]
struct Args {
    /// Signal server to connect to.
    #[arg(long, default_value = "ws://127.0.0.1:4649")]
    url: String,

    /// Generate a synthetic signal instead of connecting.
    #[arg(long)]
    simulate: bool,

    /// Seed for the simulated signal.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// With --simulate, switch the selected entity every N seconds.
    #[arg(long)]
    cycle_selection: Option<f32>,

    /// Run a relax/concentrate calibration at startup.
    #[arg(long)]
    calibrate: bool,

    /// Stretch the persisted calibration range onto 0..1.
    #[arg(long)]
    rescale: bool,

    /// Where calibration thresholds are stored.
    #[arg(long, default_value = "levitate-settings.json")]
    settings: PathBuf,

    /// Engine tuning overrides as JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control loop rate.
    #[arg(long, default_value_t = 60.0)]
    tick_hz: f64,

    /// Number of entities to register, ids 0..N.
    #[arg(long, default_value_t = 3)]
    entities: usize,

    /// Disable the sound card.
    #[arg(long)]
    no_audio: bool,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<f64>,
}

fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json_str(&text)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if args.rescale {
        config.threshold_policy = ThresholdPolicy::Rescale;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.tick_hz > 0.0, "--tick-hz must be positive");

    let mut config = load_config(&args)?;
    let audio = if args.no_audio {
        AudioSink::silent()
    } else {
        AudioSink::start()
    };
    // Tone buffers are generated at the device rate.
    config.tone.sample_rate = audio.sample_rate();

    let settings = JsonSettings::open(&args.settings)?;
    log::info!("settings file {}", settings.path().display());

    let (tx, inbox) = inbox();
    let closed = Arc::new(AtomicBool::new(false));
    let mood = MoodCell::default();
    let mut link = None;
    let mut sim_thread = None;
    if args.simulate {
        let ids: Vec<EntityId> = (0..args.entities as EntityId).collect();
        let sim_config = SimulatorConfig {
            seed: args.seed,
            cycle_selection: args
                .cycle_selection
                .map(|secs| (Duration::from_secs_f32(secs.max(0.1)), ids)),
            ..SimulatorConfig::default()
        };
        let sim = Simulator::new(sim_config, tx, mood.clone());
        sim_thread = Some(spawn_simulator(sim, Arc::clone(&closed))?);
    } else {
        let handle = link::spawn_ws_link(args.url.clone(), tx)?;
        link = Some(handle);
    }
    let link_closed = link.as_ref().map(|l| l.closer()).unwrap_or_else(|| Arc::clone(&closed));

    let mut host = NativeHost::new(audio, settings, link_closed);
    if args.simulate {
        host = host.with_mood(mood);
    }

    let mut engine = ControlEngine::new(config);
    for index in 0..args.entities {
        let entity = EntityConfig {
            id: index as EntityId,
            base_position: default_entity_position(index),
            color_rgb: default_entity_color(index),
        };
        if let Err(e) = engine.register(entity) {
            log::error!("{e}");
        }
    }
    log::info!("{} entities registered", engine.registry().len());

    engine.load_thresholds(&host);
    if args.calibrate {
        engine.start_calibration(&mut host);
    }

    let commands = commands::spawn_stdin_reader();
    let tick = Duration::from_secs_f64(1.0 / args.tick_hz);
    let start = Instant::now();
    let mut last = start;
    let mut last_report = start;
    let mut calibrating = args.calibrate;

    'run: loop {
        loop {
            match commands.try_recv() {
                Ok(Command::Select(id)) => {
                    engine.select(id, &mut host);
                }
                Ok(Command::Remove(id)) => {
                    if engine.deregister(id, &mut host).is_none() {
                        log::warn!("no entity {id}");
                    }
                }
                Ok(Command::Calibrate) => {
                    engine.start_calibration(&mut host);
                    calibrating = true;
                }
                Ok(Command::Abort) => {
                    engine.abort_calibration(&mut host);
                    calibrating = false;
                }
                Ok(Command::Status) => log::info!("{}", host.status_line(&engine)),
                Ok(Command::Quit) => break 'run,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }

        let now = Instant::now();
        let dt = now - last;
        last = now;
        engine.tick(dt, &inbox, &mut host);

        if calibrating && engine.calibration().is_some_and(|s| s.is_done()) {
            calibrating = false;
            if let Some(t) = engine.thresholds() {
                log::info!("calibrated range {:.3}..{:.3}", t.low, t.high);
            }
        }

        if now - last_report >= REPORT_EVERY {
            last_report = now;
            log::info!("{}", host.status_line(&engine));
        }

        if engine.registry().is_empty() && host.link_closed() {
            log::info!("all entities removed");
            break;
        }
        if let Some(limit) = args.duration {
            if start.elapsed().as_secs_f64() >= limit {
                break;
            }
        }

        thread::sleep(tick.saturating_sub(now.elapsed()));
    }

    let ids: Vec<EntityId> = engine.registry().entities().iter().map(|e| e.id).collect();
    for id in ids {
        engine.deregister(id, &mut host);
    }
    if let Some(link) = link {
        link.join();
    }
    if let Some(thread) = sim_thread {
        closed.store(true, std::sync::atomic::Ordering::SeqCst);
        if thread.join().is_err() {
            log::error!("simulator thread panicked");
        }
    }
    log::info!("bye");
    Ok(())
}
