//! Hand-off queue between the I/O side of the channel and the tick loop.
//!
//! The I/O thread only ever pushes raw frames and status notices into an
//! [`InboxSender`]. The tick owns the [`Inbox`] and drains it without blocking
//! at the start of every tick, so entity state is never touched from the I/O
//! context and messages are applied strictly in arrival order.

use crate::message::{decode, ChannelEvent};
use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Connection state reported by the channel collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected(String),
}

/// Raw item crossing the thread boundary.
#[derive(Clone, Debug)]
pub enum Inbound {
    Frame(Vec<u8>),
    Status(ConnectionStatus),
}

/// An item after decoding on the tick side.
#[derive(Clone, Debug, PartialEq)]
pub enum Drained {
    Event(ChannelEvent),
    Status(ConnectionStatus),
}

/// Producer half, cloneable and `Send`.
#[derive(Clone, Debug)]
pub struct InboxSender {
    tx: Sender<Inbound>,
}

impl InboxSender {
    /// Returns `false` once the tick side has gone away.
    pub fn push_frame(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.tx.send(Inbound::Frame(bytes.into())).is_ok()
    }

    pub fn push_status(&self, status: ConnectionStatus) -> bool {
        self.tx.send(Inbound::Status(status)).is_ok()
    }
}

/// Consumer half, owned by the tick loop.
#[derive(Debug)]
pub struct Inbox {
    rx: Receiver<Inbound>,
}

pub fn inbox() -> (InboxSender, Inbox) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (InboxSender { tx }, Inbox { rx })
}

impl Inbox {
    /// Decode everything buffered so far, in arrival order. Undecodable frames
    /// are skipped. Returns immediately when nothing is pending.
    pub fn drain_into(&self, out: &mut Vec<Drained>) {
        loop {
            match self.rx.try_recv() {
                Ok(Inbound::Frame(bytes)) => {
                    if let Some(ev) = decode(&bytes) {
                        out.push(Drained::Event(ev));
                    }
                }
                Ok(Inbound::Status(status)) => out.push(Drained::Status(status)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
