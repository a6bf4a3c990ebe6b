use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::clients::calendar_client::CalendarApi;
use crate::clients::groupme_client::MessageSender;
use crate::config::{AiMode, Settings};
use crate::models::message::IncomingMessage;
use crate::models::roster::Roster;
use crate::models::shift::{CalendarCommand, Interpretation};
use crate::service::agentic::{AgenticWorkflow, WorkflowContext};
use crate::service::dispatcher::{Dispatcher, RetryPolicy};
use crate::service::filter::{EligibilityFilter, FilterDecision};
use crate::service::interpreter::{prompt_context, InterpretationEngine};
use crate::service::openai_service::OpenAIClient;
use crate::service::prompts::PromptContext;
use crate::service::translator::to_commands;
use crate::service::validation::{Rejection, ThresholdGate};

/// Outcome of one message. Every call to [`Pipeline::process`] produces one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    pub message_id: String,
    pub processed: bool,
    pub commands_dispatched: usize,
    pub commands_failed: usize,
    pub warnings: Vec<String>,
    pub reason: String,
}

impl ProcessResult {
    pub fn ignored(message_id: &str, reason: impl Into<String>) -> Self {
        Self {
            message_id: message_id.to_string(),
            processed: false,
            commands_dispatched: 0,
            commands_failed: 0,
            warnings: Vec::new(),
            reason: reason.into(),
        }
    }
}

/// Interpretation without dispatch, for the `interpret` command.
#[derive(Debug, Clone)]
pub enum Preview {
    Ignored(&'static str),
    Failed(String),
    Interpreted {
        interpretation: Interpretation,
        commands: Vec<CalendarCommand>,
        rejected: Vec<Rejection>,
    },
}

pub struct Pipeline {
    roster: Arc<Roster>,
    filter: EligibilityFilter,
    timezone: Tz,
    engine: InterpretationEngine,
    gate: ThresholdGate,
    dispatcher: Arc<Dispatcher>,
    agentic: Option<AgenticWorkflow>,
    chat: Option<Arc<dyn MessageSender>>,
    post_confirmations: bool,
}

impl Pipeline {
    pub fn new(
        settings: &Settings,
        roster: Arc<Roster>,
        openai: Arc<dyn OpenAIClient>,
        calendar: Arc<dyn CalendarApi>,
        chat: Option<Arc<dyn MessageSender>>,
    ) -> Self {
        let gate = ThresholdGate::new(settings.confidence_threshold);
        let dispatcher = Arc::new(Dispatcher::new(
            calendar,
            RetryPolicy {
                max_attempts: settings.dispatch_max_attempts,
                base_backoff: settings.dispatch_backoff,
            },
        ));
        let agentic = match settings.ai_mode {
            AiMode::Simple => None,
            AiMode::Agentic => Some(AgenticWorkflow::new(
                openai.clone(),
                dispatcher.clone(),
                gate,
                chat.clone(),
                settings.max_tool_rounds,
            )),
        };
        Self {
            roster,
            filter: EligibilityFilter::new(settings.shift_keywords.clone()),
            timezone: settings.timezone,
            engine: InterpretationEngine::new(openai),
            gate,
            dispatcher,
            agentic,
            chat,
            post_confirmations: settings.post_confirmations,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub async fn process(&self, message: &IncomingMessage) -> ProcessResult {
        self.process_at(message, Utc::now()).await
    }

    /// Runs one message end to end with `now` as the reference clock.
    pub async fn process_at(&self, message: &IncomingMessage, now: DateTime<Utc>) -> ProcessResult {
        let ctx = match self.eligible_context(message, now) {
            Ok(ctx) => ctx,
            Err(reason) => return ProcessResult::ignored(&message.id, reason),
        };

        let run = match &self.agentic {
            Some(workflow) => workflow.run(&ctx, message).await,
            None => self.run_simple(&ctx, message).await,
        };

        let result = summarize(&message.id, &run);
        if self.post_confirmations {
            self.post_confirmation(&message.group_id, &run).await;
        }
        info!(
            message_id = %result.message_id,
            processed = result.processed,
            dispatched = result.commands_dispatched,
            failed = result.commands_failed,
            warnings = result.warnings.len(),
            reason = %result.reason,
            "message finished"
        );
        result
    }

    pub async fn preview_at(&self, message: &IncomingMessage, now: DateTime<Utc>) -> Preview {
        let ctx = match self.eligible_context(message, now) {
            Ok(ctx) => ctx,
            Err(reason) => return Preview::Ignored(reason),
        };
        let interpreted = match &self.agentic {
            Some(workflow) => workflow.interpret(&ctx).await.map(|(i, _)| i),
            None => self.engine.interpret(&ctx).await,
        };
        match interpreted {
            Ok(interpretation) => {
                let outcome = self.gate.evaluate(&interpretation);
                Preview::Interpreted {
                    commands: to_commands(&outcome.accepted, true),
                    rejected: outcome.rejected,
                    interpretation,
                }
            }
            Err(err) => Preview::Failed(err.to_string()),
        }
    }

    fn eligible_context(
        &self,
        message: &IncomingMessage,
        now: DateTime<Utc>,
    ) -> Result<PromptContext, &'static str> {
        match self.filter.evaluate(&self.roster, message) {
            FilterDecision::Eligible(member) => {
                info!(
                    message_id = %message.id,
                    sender = %message.sender_name,
                    squad = member.squad,
                    role = %member.role,
                    "processing message"
                );
                Ok(prompt_context(self.timezone, member, message, now))
            }
            decision => {
                debug!(
                    message_id = %message.id,
                    sender = %message.sender_name,
                    reason = decision.reason(),
                    "message ignored"
                );
                Err(decision.reason())
            }
        }
    }

    async fn run_simple(&self, ctx: &PromptContext, message: &IncomingMessage) -> WorkflowContext {
        let mut run = WorkflowContext::default();
        match self.engine.interpret(ctx).await {
            Ok(interpretation) => {
                run.outcome = self.gate.evaluate(&interpretation);
                run.interpretation = Some(interpretation);
            }
            Err(err) => {
                error!(message_id = %message.id, text = %message.text, error = %err, "interpretation failed");
                run.error = Some(err.to_string());
                return run;
            }
        }
        let commands = to_commands(&run.outcome.accepted, message.preview);
        run.reports = self.dispatcher.dispatch_all(&commands).await;
        run
    }

    async fn post_confirmation(&self, group_id: &str, run: &WorkflowContext) {
        let Some(chat) = &self.chat else {
            return;
        };
        let lines: Vec<String> = run
            .reports
            .iter()
            .filter(|r| r.is_sent())
            .map(|r| format!("- {}", r.command.describe()))
            .collect();
        if lines.is_empty() {
            return;
        }
        let text = format!("✅ Calendar updated:\n{}", lines.join("\n"));
        if let Err(err) = chat.send_message(group_id, &text).await {
            error!(error = %err, "failed to post confirmation");
        }
    }
}

fn summarize(message_id: &str, run: &WorkflowContext) -> ProcessResult {
    let warnings: Vec<String> = run
        .critical_warnings
        .iter()
        .chain(run.warnings.iter())
        .cloned()
        .collect();

    if let Some(err) = &run.error {
        return ProcessResult {
            warnings,
            ..ProcessResult::ignored(message_id, format!("interpretation failed: {}", err))
        };
    }

    let dispatched = run.reports.iter().filter(|r| r.is_sent()).count();
    let failed = run.reports.len() - dispatched;
    let reason = match &run.interpretation {
        Some(i) if !i.is_shift_request || i.requests.is_empty() => "not a shift request".to_string(),
        _ if run.outcome.accepted.is_empty() => {
            let reasons: Vec<String> = run
                .outcome
                .rejected
                .iter()
                .map(|r| format!("squad {}: {}", r.request.squad, r.reason))
                .collect();
            format!("all requests rejected for manual review ({})", reasons.join("; "))
        }
        _ => format!("{} command(s) dispatched, {} failed", dispatched, failed),
    };

    ProcessResult {
        message_id: message_id.to_string(),
        processed: true,
        commands_dispatched: dispatched,
        commands_failed: failed,
        warnings,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shift::{ShiftAction, ShiftChangeRequest};
    use crate::service::dispatcher::{DispatchReport, DispatchStatus};
    use crate::service::validation::RejectReason;

    fn command() -> CalendarCommand {
        CalendarCommand {
            action: ShiftAction::NoCrew,
            squad: 42,
            date: "20260101".to_string(),
            shift_start: "1800".to_string(),
            shift_end: "0000".to_string(),
            preview: false,
        }
    }

    #[test]
    fn counts_sent_and_failed_reports() {
        let mut run = WorkflowContext::default();
        run.interpretation = Some(Interpretation {
            is_shift_request: true,
            requests: vec![ShiftChangeRequest {
                action: ShiftAction::NoCrew,
                squad: 42,
                date: "20260101".to_string(),
                shift_start: "1800".to_string(),
                shift_end: "midnight".to_string(),
                confidence: 95,
                reasoning: String::new(),
            }],
            ..Interpretation::default()
        });
        run.outcome.accepted.push(crate::service::validation::AcceptedRequest {
            action: ShiftAction::NoCrew,
            squad: 42,
            date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            shift_start: "1800".to_string(),
            shift_end: "0000".to_string(),
            confidence: 95,
        });
        run.reports = vec![
            DispatchReport {
                command: command(),
                status: DispatchStatus::Sent { attempts: 1 },
            },
            DispatchReport {
                command: command(),
                status: DispatchStatus::Exhausted {
                    attempts: 3,
                    error: "503".to_string(),
                },
            },
        ];
        let result = summarize("m1", &run);
        assert!(result.processed);
        assert_eq!(result.commands_dispatched, 1);
        assert_eq!(result.commands_failed, 1);
    }

    #[test]
    fn rejected_requests_explain_themselves() {
        let mut run = WorkflowContext::default();
        let request = ShiftChangeRequest {
            action: ShiftAction::NoCrew,
            squad: 42,
            date: "20260101".to_string(),
            shift_start: "1800".to_string(),
            shift_end: "0600".to_string(),
            confidence: 40,
            reasoning: String::new(),
        };
        run.interpretation = Some(Interpretation {
            is_shift_request: true,
            requests: vec![request.clone()],
            ..Interpretation::default()
        });
        run.outcome.rejected.push(Rejection {
            request,
            reason: RejectReason::LowConfidence {
                confidence: 40,
                threshold: 70,
            },
        });
        let result = summarize("m2", &run);
        assert_eq!(result.commands_dispatched, 0);
        assert!(result.reason.contains("manual review"));
        assert!(result.reason.contains("low confidence"));
    }

    #[test]
    fn failed_interpretation_is_not_processed() {
        let run = WorkflowContext {
            error: Some("model returned status 500".to_string()),
            ..WorkflowContext::default()
        };
        let result = summarize("m3", &run);
        assert!(!result.processed);
        assert!(result.reason.starts_with("interpretation failed"));
    }
}
