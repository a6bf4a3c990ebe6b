use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::clients::calendar_client::CalendarApi;
use crate::clients::groupme_client::{format_critical, format_warning, MessageSender};
use crate::clients::openai_client::ChatMessage;
use crate::error::InterpretError;
use crate::models::message::IncomingMessage;
use crate::models::shift::Interpretation;
use crate::service::dispatcher::{DispatchReport, Dispatcher};
use crate::service::interpreter::parse_interpretation;
use crate::service::openai_service::OpenAIClient;
use crate::service::prompts::{agent_system_prompt, PromptContext, AGENT_FINALIZE};
use crate::service::time_vocab::format_date;
use crate::service::tools::ToolRegistry;
use crate::service::translator::to_commands;
use crate::service::validation::{AcceptedRequest, GateOutcome, ThresholdGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Interpreting,
    Validating,
    Warning,
    Executing,
    Done,
}

/// Everything a workflow run has accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    pub interpretation: Option<Interpretation>,
    pub error: Option<String>,
    pub tool_rounds: usize,
    pub outcome: GateOutcome,
    pub warnings: Vec<String>,
    pub critical_warnings: Vec<String>,
    pub reports: Vec<DispatchReport>,
}

impl WorkflowContext {
    fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() || !self.critical_warnings.is_empty()
    }

    fn push_warning(&mut self, warning: String) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    fn push_critical(&mut self, warning: String) {
        if !self.critical_warnings.contains(&warning) {
            self.critical_warnings.push(warning);
        }
    }
}

pub fn next_state(state: WorkflowState, ctx: &WorkflowContext) -> WorkflowState {
    match state {
        WorkflowState::Interpreting => match &ctx.interpretation {
            Some(i) if ctx.error.is_none() && i.is_shift_request && !i.requests.is_empty() => {
                WorkflowState::Validating
            }
            _ => WorkflowState::Done,
        },
        WorkflowState::Validating => {
            if ctx.has_warnings() {
                WorkflowState::Warning
            } else if ctx.outcome.accepted.is_empty() {
                WorkflowState::Done
            } else {
                WorkflowState::Executing
            }
        }
        WorkflowState::Warning => {
            if ctx.outcome.accepted.is_empty() {
                WorkflowState::Done
            } else {
                WorkflowState::Executing
            }
        }
        WorkflowState::Executing | WorkflowState::Done => WorkflowState::Done,
    }
}

/// Schedule-aware interpretation: the model may query the calendar before answering,
/// removals are cross-checked against live coverage, and warnings go to the group.
pub struct AgenticWorkflow {
    openai: Arc<dyn OpenAIClient>,
    calendar: Arc<dyn CalendarApi>,
    dispatcher: Arc<Dispatcher>,
    gate: ThresholdGate,
    chat: Option<Arc<dyn MessageSender>>,
    max_tool_rounds: usize,
}

impl AgenticWorkflow {
    pub fn new(
        openai: Arc<dyn OpenAIClient>,
        dispatcher: Arc<Dispatcher>,
        gate: ThresholdGate,
        chat: Option<Arc<dyn MessageSender>>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            openai,
            calendar: dispatcher.calendar(),
            dispatcher,
            gate,
            chat,
            max_tool_rounds,
        }
    }

    pub async fn run(&self, ctx: &PromptContext, message: &IncomingMessage) -> WorkflowContext {
        let mut wf = WorkflowContext::default();
        let mut state = WorkflowState::Interpreting;
        while state != WorkflowState::Done {
            info!(message_id = %message.id, ?state, "workflow step");
            match state {
                WorkflowState::Interpreting => match self.interpret(ctx).await {
                    Ok((interpretation, rounds)) => {
                        wf.tool_rounds = rounds;
                        wf.interpretation = Some(interpretation);
                    }
                    Err(err) => {
                        error!(message_id = %message.id, text = %message.text, error = %err, "interpretation failed");
                        wf.error = Some(err.to_string());
                    }
                },
                WorkflowState::Validating => self.validate(&mut wf).await,
                WorkflowState::Warning => self.send_warnings(&message.group_id, &wf).await,
                WorkflowState::Executing => {
                    let commands = to_commands(&wf.outcome.accepted, message.preview);
                    wf.reports = self.dispatcher.dispatch_all(&commands).await;
                }
                WorkflowState::Done => {}
            }
            state = next_state(state, &wf);
        }
        wf
    }

    /// Tool-calling loop. Returns the parsed interpretation and the number of tool rounds used.
    pub async fn interpret(
        &self,
        ctx: &PromptContext,
    ) -> Result<(Interpretation, usize), InterpretError> {
        let registry = ToolRegistry::for_calendar(self.calendar.clone(), ctx.current_date);
        let tools = registry.definitions();
        debug!(tools = registry.len(), "tools offered to the model");
        let mut messages = vec![
            ChatMessage::system(agent_system_prompt(ctx, self.max_tool_rounds)),
            ChatMessage::user(format!(
                "Message from {}: \"{}\"",
                ctx.sender_name, ctx.message_text
            )),
        ];

        let mut rounds = 0;
        let final_text = loop {
            if rounds >= self.max_tool_rounds {
                warn!(rounds, "tool rounds exhausted; asking for a final answer");
                messages.push(ChatMessage::user(AGENT_FINALIZE));
                let reply = self.openai.chat(&messages, &[]).await?;
                if reply.text().trim().is_empty() {
                    return Err(InterpretError::ToolLoopExhausted(rounds));
                }
                break reply.text().to_string();
            }

            let reply = self.openai.chat(&messages, &tools).await?;
            if reply.tool_calls.is_empty() {
                break reply.text().to_string();
            }
            rounds += 1;
            let calls = reply.tool_calls.clone();
            messages.push(reply);
            for call in &calls {
                let result = registry.run_call(call).await;
                messages.push(ChatMessage::tool_result(call.id.clone(), result));
            }
        };

        let interpretation = parse_interpretation(&final_text)?;
        info!(
            sender = %ctx.sender_name,
            is_shift_request = interpretation.is_shift_request,
            requests = interpretation.requests.len(),
            tool_rounds = rounds,
            "agentic interpretation complete"
        );
        Ok((interpretation, rounds))
    }

    async fn validate(&self, wf: &mut WorkflowContext) {
        let Some(interpretation) = wf.interpretation.clone() else {
            return;
        };
        wf.outcome = self.gate.evaluate(&interpretation);
        for warning in interpretation.critical_warnings {
            wf.push_critical(warning);
        }
        for warning in interpretation.warnings {
            wf.push_warning(warning);
        }

        let removals: Vec<AcceptedRequest> = wf
            .outcome
            .accepted
            .iter()
            .filter(|r| r.action.is_removal())
            .cloned()
            .collect();
        for request in removals {
            self.check_coverage(&request, wf).await;
        }
    }

    async fn check_coverage(&self, request: &AcceptedRequest, wf: &mut WorkflowContext) {
        let date = format_date(request.date);
        let window = format!("{} {}-{}", date, request.shift_start, request.shift_end);
        let schedule = match self.calendar.get_schedule(&date, &date, None).await {
            Ok(schedule) => schedule,
            Err(err) => {
                warn!(squad = request.squad, date = %date, error = %err, "schedule lookup failed");
                wf.push_warning(format!(
                    "Could not verify the schedule for squad {} on {}: {}",
                    request.squad, window, err
                ));
                return;
            }
        };

        if !schedule.is_scheduled(request.squad, &date, &request.shift_start, &request.shift_end) {
            wf.push_warning(format!(
                "Squad {} is not currently scheduled for {}",
                request.squad, window
            ));
        }

        let remaining = schedule.count_available(
            &date,
            &request.shift_start,
            &request.shift_end,
            Some(request.squad),
        );
        match remaining {
            0 => wf.push_critical(format!(
                "Removing squad {} leaves NO crews on duty for {}. The station will be out of service.",
                request.squad, window
            )),
            1 => wf.push_warning(format!(
                "Reduced redundancy: only one crew remains on duty for {} after removing squad {}",
                window, request.squad
            )),
            _ => {}
        }
    }

    async fn send_warnings(&self, group_id: &str, wf: &WorkflowContext) {
        let Some(chat) = &self.chat else {
            for warning in wf.critical_warnings.iter().chain(wf.warnings.iter()) {
                warn!(warning = %warning, "no chat sender configured; warning not posted");
            }
            return;
        };
        let texts = wf
            .critical_warnings
            .iter()
            .map(|w| format_critical(w))
            .chain(wf.warnings.iter().map(|w| format_warning(w)));
        for text in texts {
            if let Err(err) = chat.send_message(group_id, &text).await {
                error!(error = %err, "failed to post warning");
            }
        }
    }
}
