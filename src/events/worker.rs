use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::queue::Event;
use crate::service::pipeline::{Pipeline, ProcessResult};

/// How many message ids the worker remembers when serve mode runs webhook and poller together.
pub const RECENT_ID_CAPACITY: usize = 1024;

/// Bounded memory of message ids the worker has already run, oldest evicted first.
#[derive(Debug)]
pub struct RecentIds {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records `id`. Returns false when it was already remembered.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }
}

/// Drains the queue, running each message to completion before taking the next.
/// A message id the worker has already run is answered as ignored without touching the pipeline.
pub async fn run_event_worker(mut rx: mpsc::Receiver<Event>, pipeline: Arc<Pipeline>) {
    let mut recent = RecentIds::new(RECENT_ID_CAPACITY);
    while let Some(event) = rx.recv().await {
        match event {
            Event::Inbound { message, reply } => {
                let result = if message.id.is_empty() || recent.insert(&message.id) {
                    pipeline.process(&message).await
                } else {
                    debug!(message_id = %message.id, "already processed; skipping");
                    ProcessResult::ignored(&message.id, "already processed")
                };
                if reply.send(result).is_err() {
                    warn!(message_id = %message.id, "caller went away before the result was ready");
                }
            }
        }
    }
    info!("event queue closed; worker stopping");
}
