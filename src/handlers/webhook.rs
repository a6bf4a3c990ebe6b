use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::filters::body::BodyDeserializeError;
use warp::{Filter, Rejection, Reply};

use crate::models::message::InboundRecord;
use crate::tasks::poller::MessageHandler;

const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookReply {
    pub status: &'static str,
    pub reason: String,
    pub commands_dispatched: usize,
    pub warnings: Vec<String>,
}

impl WebhookReply {
    fn ignored(reason: impl Into<String>) -> Self {
        Self {
            status: "ignored",
            reason: reason.into(),
            commands_dispatched: 0,
            warnings: Vec::new(),
        }
    }

    fn error(reason: impl Into<String>) -> Self {
        Self {
            status: "error",
            ..Self::ignored(reason)
        }
    }
}

/// Handles one callback payload. Returns the HTTP status alongside the reply body.
pub async fn handle_webhook(handler: &dyn MessageHandler, payload: Value) -> (StatusCode, WebhookReply) {
    let record: InboundRecord = match serde_json::from_value(payload) {
        Ok(record) => record,
        Err(err) => {
            warn!(error = %err, "webhook payload is not a message record");
            return (
                StatusCode::BAD_REQUEST,
                WebhookReply::error(format!("invalid message record: {}", err)),
            );
        }
    };

    let id = record.id.clone();
    let message = match record.into_message() {
        Ok(message) => message,
        Err(skip) => {
            debug!(message_id = %id, reason = skip.reason(), "skipped at intake");
            return (StatusCode::OK, WebhookReply::ignored(skip.reason()));
        }
    };

    info!(message_id = %message.id, sender = %message.sender_name, "webhook message received");
    match handler.handle(message).await {
        Some(result) => (
            StatusCode::OK,
            WebhookReply {
                status: if result.processed { "processed" } else { "ignored" },
                reason: result.reason,
                commands_dispatched: result.commands_dispatched,
                warnings: result.warnings,
            },
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            WebhookReply::error("message worker unavailable"),
        ),
    }
}

pub fn routes(
    handler: Arc<dyn MessageHandler>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "running", "service": "shiftBot" })));

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "healthy" })));

    let webhook = warp::path("webhook")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .then(move |payload: Value| {
            let handler = handler.clone();
            async move {
                let (status, reply) = handle_webhook(handler.as_ref(), payload).await;
                warp::reply::with_status(warp::reply::json(&reply), status)
            }
        });

    index.or(health).or(webhook).recover(malformed_body)
}

async fn malformed_body(err: Rejection) -> Result<impl Reply, Rejection> {
    match err.find::<BodyDeserializeError>() {
        Some(cause) => {
            warn!(error = %cause, "rejected malformed webhook body");
            Ok(warp::reply::with_status(
                warp::reply::json(&WebhookReply::error(format!("invalid JSON: {}", cause))),
                StatusCode::BAD_REQUEST,
            ))
        }
        None => Err(err),
    }
}

pub async fn serve(handler: Arc<dyn MessageHandler>, port: u16) {
    info!(port, "webhook server listening");
    warp::serve(routes(handler)).run(([0, 0, 0, 0], port)).await;
}
