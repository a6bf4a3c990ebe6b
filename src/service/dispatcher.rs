use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::clients::calendar_client::CalendarApi;
use crate::models::shift::CalendarCommand;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    Sent { attempts: u32 },
    Rejected { attempts: u32, error: String },
    Exhausted { attempts: u32, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub command: CalendarCommand,
    #[serde(flatten)]
    pub status: DispatchStatus,
}

impl DispatchReport {
    pub fn is_sent(&self) -> bool {
        matches!(self.status, DispatchStatus::Sent { .. })
    }
}

pub struct Dispatcher {
    calendar: Arc<dyn CalendarApi>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(calendar: Arc<dyn CalendarApi>, policy: RetryPolicy) -> Self {
        Self { calendar, policy }
    }

    pub fn calendar(&self) -> Arc<dyn CalendarApi> {
        self.calendar.clone()
    }

    pub async fn dispatch(&self, command: &CalendarCommand) -> DispatchReport {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.calendar.send_command(command).await {
                Ok(response) => {
                    info!(command = %command.describe(), attempt, %response, "calendar command executed");
                    return DispatchReport {
                        command: command.clone(),
                        status: DispatchStatus::Sent { attempts: attempt },
                    };
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        command = %command.describe(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "calendar command failed; retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    error!(command = %command.describe(), attempts = attempt, error = %err, "calendar command failed; giving up");
                    return DispatchReport {
                        command: command.clone(),
                        status: DispatchStatus::Exhausted {
                            attempts: attempt,
                            error: err.to_string(),
                        },
                    };
                }
                Err(err) => {
                    error!(command = %command.describe(), error = %err, "calendar rejected command");
                    return DispatchReport {
                        command: command.clone(),
                        status: DispatchStatus::Rejected {
                            attempts: attempt,
                            error: err.to_string(),
                        },
                    };
                }
            }
        }
    }

    /// Dispatches in order. A failed command never stops the ones after it.
    pub async fn dispatch_all(&self, commands: &[CalendarCommand]) -> Vec<DispatchReport> {
        let mut reports = Vec::with_capacity(commands.len());
        for command in commands {
            reports.push(self.dispatch(command).await);
        }
        reports
    }
}
