//! Bounded inbox between the transport and the tick loop.
//!
//! Transport tasks push decoded messages as they arrive; the tick loop
//! takes everything queued at the start of each tick as one batch, in
//! arrival order.

use gridwar_core::components::PlayerId;
use gridwar_core::protocol::InboundMessage;
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::error::{Result, ServerError};

/// Create an inbox holding at most `capacity` undrained messages.
#[must_use]
pub fn inbox(capacity: usize) -> (InboxSender, Inbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        InboxSender { tx },
        Inbox {
            rx,
            disconnected: false,
        },
    )
}

/// Producer half, cloned into every transport task.
#[derive(Debug, Clone)]
pub struct InboxSender {
    tx: mpsc::Sender<InboundMessage>,
}

impl InboxSender {
    /// Queue a message, waiting while the inbox is full.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InboxClosed`] if the tick loop is gone.
    pub async fn send(&self, message: InboundMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| ServerError::InboxClosed)
    }
}

/// Who a line read from a transport is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineIdentity {
    /// Every line comes from this connection. Any `connection_id` in the
    /// line is ignored.
    Connection(PlayerId),
    /// Lines name their own sender. Only for trusted development input,
    /// such as a recorded session piped into stdin.
    Trusted,
}

impl LineIdentity {
    /// Decode one line into an inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`gridwar_core::error::GameError::MessageDecode`] if the
    /// line is not a message object.
    pub fn decode(&self, line: &str) -> gridwar_core::error::Result<InboundMessage> {
        match self {
            Self::Connection(player) => InboundMessage::from_payload(player.clone(), line),
            Self::Trusted => InboundMessage::from_json(line),
        }
    }
}

/// Consumer half, owned by the tick loop.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::Receiver<InboundMessage>,
    disconnected: bool,
}

impl Inbox {
    /// Take every queued message without waiting.
    pub fn drain(&mut self) -> Vec<InboundMessage> {
        let mut batch = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        batch
    }

    /// Whether every sender has been dropped and the queue is empty.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.disconnected
    }
}
