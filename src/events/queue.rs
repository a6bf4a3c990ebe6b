use tokio::sync::{mpsc, oneshot};

use crate::models::message::IncomingMessage;
use crate::service::pipeline::ProcessResult;

pub enum Event {
    Inbound {
        message: IncomingMessage,
        reply: oneshot::Sender<ProcessResult>,
    },
}

/// Front door for messages that must run through the pipeline one at a time.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

impl EventBus {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Queues a message and waits for its result. `None` means the worker has stopped.
    pub async fn submit(&self, message: IncomingMessage) -> Option<ProcessResult> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Event::Inbound { message, reply }).await.ok()?;
        rx.await.ok()
    }
}
