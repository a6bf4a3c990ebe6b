use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::CalendarError;
use crate::models::schedule::Schedule;
use crate::models::shift::CalendarCommand;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn send_command(&self, command: &CalendarCommand) -> Result<Value, CalendarError>;

    async fn get_schedule(
        &self,
        start_date: &str,
        end_date: &str,
        squad: Option<u16>,
    ) -> Result<Schedule, CalendarError>;
}

/// 5xx is worth retrying, any other non-success status is a rejection of the request itself.
pub fn classify_status(status: StatusCode, body: &str) -> Result<(), CalendarError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() {
        Err(CalendarError::Transient(format!("status {}: {}", status.as_u16(), body)))
    } else {
        Err(CalendarError::Permanent {
            status: status.as_u16(),
            body: body.to_string(),
        })
    }
}

fn transport(err: reqwest::Error) -> CalendarError {
    CalendarError::Transient(err.to_string())
}

/// Calendar service client. Commands are plain GETs with query parameters, so replaying
/// one is harmless.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    base_url: String,
}

impl CalendarClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<String, CalendarError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(params)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        classify_status(status, &body)?;
        Ok(body)
    }
}

#[async_trait]
impl CalendarApi for CalendarClient {
    async fn send_command(&self, command: &CalendarCommand) -> Result<Value, CalendarError> {
        info!(
            action = %command.action,
            squad = command.squad,
            date = %command.date,
            shift_start = %command.shift_start,
            shift_end = %command.shift_end,
            preview = command.preview,
            "sending calendar command"
        );
        let body = self.get(&command.to_query_params()).await?;
        Ok(serde_json::from_str(&body)
            .unwrap_or_else(|_| json!({ "status": "success", "message": body })))
    }

    async fn get_schedule(
        &self,
        start_date: &str,
        end_date: &str,
        squad: Option<u16>,
    ) -> Result<Schedule, CalendarError> {
        let mut params = vec![
            ("action", "getSchedule".to_string()),
            ("start_date", start_date.to_string()),
            ("end_date", end_date.to_string()),
        ];
        if let Some(squad) = squad {
            params.push(("squad", squad.to_string()));
        }
        debug!(start_date, end_date, ?squad, "fetching schedule");
        let body = self.get(&params).await?;
        serde_json::from_str(&body).map_err(|e| CalendarError::Decode(e.to_string()))
    }
}
