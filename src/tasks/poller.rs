use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::clients::groupme_client::MessageSource;
use crate::error::PollError;
use crate::events::queue::EventBus;
use crate::models::cursor::{compare_ids, CursorStore};
use crate::models::message::IncomingMessage;
use crate::service::pipeline::{Pipeline, ProcessResult};

/// Anything that can take a message through the pipeline and report back.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: IncomingMessage) -> Option<ProcessResult>;
}

#[async_trait]
impl MessageHandler for Pipeline {
    async fn handle(&self, message: IncomingMessage) -> Option<ProcessResult> {
        Some(self.process(&message).await)
    }
}

#[async_trait]
impl MessageHandler for EventBus {
    async fn handle(&self, message: IncomingMessage) -> Option<ProcessResult> {
        self.submit(message).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub fetched: usize,
    pub new_messages: usize,
    pub processed: usize,
    pub ignored: usize,
    pub commands_dispatched: usize,
    pub commands_failed: usize,
    pub cursor: Option<String>,
}

/// One poll: fetch recent history, run every message newer than the cursor oldest-first,
/// and move the cursor past each one as it finishes. A cursor write failure ends the run.
pub async fn poll_once(
    source: &dyn MessageSource,
    cursor: &dyn CursorStore,
    handler: &dyn MessageHandler,
    limit: u32,
) -> Result<PollSummary, PollError> {
    let records = source.fetch_recent(limit).await?;
    let mut summary = PollSummary {
        fetched: records.len(),
        ..PollSummary::default()
    };

    // Without a cursor only the fetched window counts as new; older history is never paged.
    let last = cursor.load()?;
    let mut fresh: Vec<_> = records
        .into_iter()
        .filter(|r| match &last {
            Some(last) => compare_ids(&r.id, last) == Ordering::Greater,
            None => true,
        })
        .collect();
    fresh.sort_by(|a, b| compare_ids(&a.id, &b.id));
    summary.new_messages = fresh.len();
    summary.cursor = last;

    for record in fresh {
        let id = record.id.clone();
        match record.into_message() {
            Err(skip) => {
                debug!(message_id = %id, reason = skip.reason(), "skipped at intake");
                summary.ignored += 1;
            }
            Ok(message) => {
                let result = handler.handle(message).await.ok_or(PollError::WorkerStopped)?;
                if result.processed {
                    summary.processed += 1;
                } else {
                    summary.ignored += 1;
                }
                summary.commands_dispatched += result.commands_dispatched;
                summary.commands_failed += result.commands_failed;
            }
        }
        cursor.advance(&id)?;
        summary.cursor = Some(id);
    }

    info!(
        fetched = summary.fetched,
        new = summary.new_messages,
        processed = summary.processed,
        ignored = summary.ignored,
        dispatched = summary.commands_dispatched,
        "poll complete"
    );
    Ok(summary)
}

pub async fn run_poll_loop(
    source: Arc<dyn MessageSource>,
    cursor: Arc<dyn CursorStore>,
    handler: Arc<dyn MessageHandler>,
    limit: u32,
    interval: Duration,
) {
    loop {
        if let Err(err) = poll_once(source.as_ref(), cursor.as_ref(), handler.as_ref(), limit).await {
            error!(error = %err, "poll failed");
            if matches!(err, PollError::WorkerStopped) {
                return;
            }
        }
        sleep(interval).await;
    }
}
