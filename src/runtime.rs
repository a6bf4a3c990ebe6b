use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::calendar_client::{CalendarApi, CalendarClient};
use crate::clients::groupme_client::{GroupMeBot, GroupMeHistory, MessageSender, MessageSource};
use crate::config::Settings;
use crate::error::AppError;
use crate::events::queue::EventBus;
use crate::events::worker::run_event_worker;
use crate::handlers::webhook;
use crate::models::cursor::{CursorStore, FileCursor};
use crate::models::roster::Roster;
use crate::service::openai_service::{OpenAIClient, OpenAIService};
use crate::service::pipeline::Pipeline;
use crate::tasks::poller::{poll_once, run_poll_loop, MessageHandler, PollSummary};
use crate::tasks::task_runner::TaskRunner;

const QUEUE_DEPTH: usize = 64;

/// Wires the pipeline from settings: roster file, model, calendar and (if configured) bot.
pub fn build_pipeline(settings: &Settings) -> Result<Pipeline, AppError> {
    let roster = Roster::load(&settings.roster_file_path)?;
    info!(members = roster.len(), path = %settings.roster_file_path.display(), "roster loaded");

    let openai: Arc<dyn OpenAIClient> = Arc::new(OpenAIService::new(
        settings.require_openai_key()?.to_string(),
        settings.openai_model.clone(),
    )?);
    let calendar: Arc<dyn CalendarApi> =
        Arc::new(CalendarClient::new(settings.calendar_service_url.clone())?);

    let chat: Option<Arc<dyn MessageSender>> = match settings.require_bot_id() {
        Ok(bot_id) => Some(Arc::new(GroupMeBot::new(bot_id.to_string())?)),
        Err(_) => {
            warn!("GROUPME_BOT_ID not set; warnings and confirmations will only be logged");
            None
        }
    };

    info!(
        model = %settings.openai_model,
        mode = ?settings.ai_mode,
        calendar = %settings.calendar_service_url,
        threshold = settings.confidence_threshold,
        "pipeline ready"
    );
    Ok(Pipeline::new(settings, Arc::new(roster), openai, calendar, chat))
}

fn history(settings: &Settings) -> Result<GroupMeHistory, AppError> {
    let (token, group_id) = settings.require_poll_credentials()?;
    Ok(GroupMeHistory::new(token.to_string(), group_id.to_string())?)
}

/// Webhook server with a single pipeline worker behind it, optionally polling as well.
pub async fn run_serve(settings: Settings, pipeline: Pipeline, with_polling: bool) -> Result<(), AppError> {
    let (bus, rx) = EventBus::new(QUEUE_DEPTH);
    let mut runner = TaskRunner::new();
    runner.spawn("pipeline-worker", run_event_worker(rx, Arc::new(pipeline)));

    let handler: Arc<dyn MessageHandler> = Arc::new(bus);
    if with_polling {
        let source: Arc<dyn MessageSource> = Arc::new(history(&settings)?);
        let cursor: Arc<dyn CursorStore> = Arc::new(FileCursor::new(&settings.cursor_file_path));
        runner.spawn(
            "poller",
            run_poll_loop(
                source,
                cursor,
                handler.clone(),
                settings.poll_limit,
                settings.poll_interval,
            ),
        );
    }

    info!(tasks = runner.len(), port = settings.webhook_port, "serve mode started");
    webhook::serve(handler, settings.webhook_port).await;
    runner.join_all().await;
    Ok(())
}

pub async fn run_poll(
    settings: Settings,
    pipeline: Pipeline,
    watch: bool,
    limit: Option<u32>,
) -> Result<Option<PollSummary>, AppError> {
    let source = history(&settings)?;
    let cursor = FileCursor::new(&settings.cursor_file_path);
    let limit = limit.unwrap_or(settings.poll_limit).clamp(1, 100);

    if watch {
        run_poll_loop(
            Arc::new(source),
            Arc::new(cursor),
            Arc::new(pipeline),
            limit,
            settings.poll_interval,
        )
        .await;
        return Ok(None);
    }
    Ok(Some(poll_once(&source, &cursor, &pipeline, limit).await?))
}

pub fn reset_cursor(settings: &Settings) -> Result<bool, AppError> {
    let cursor = FileCursor::new(&settings.cursor_file_path);
    let removed = cursor.reset()?;
    info!(path = %cursor.path().display(), removed, "cursor reset");
    Ok(removed)
}
