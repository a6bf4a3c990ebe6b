use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::clients::calendar_client::CalendarApi;
use crate::clients::openai_client::{FunctionDefinition, ToolCall, ToolDefinition};
use crate::error::ToolError;
use crate::service::time_vocab::{normalize_hhmm, resolve_reference};

/// Read-only capability the model can call while reasoning about a message.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;

    fn name(&self) -> &'static str {
        self.definition().function.name
    }
}

fn function(name: &'static str, description: &'static str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        kind: "function",
        function: FunctionDefinition {
            name,
            description,
            parameters,
        },
    }
}

fn args<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn hhmm(raw: &str) -> String {
    normalize_hhmm(raw).unwrap_or_else(|| raw.trim().to_string())
}

#[derive(Debug, Deserialize)]
struct GetScheduleArgs {
    start_date: String,
    end_date: String,
    #[serde(default)]
    squad: Option<u16>,
}

pub struct GetSchedule {
    calendar: Arc<dyn CalendarApi>,
}

#[async_trait]
impl Tool for GetSchedule {
    fn definition(&self) -> ToolDefinition {
        function(
            "get_schedule",
            "Fetch the current schedule for a date range, optionally for one squad.",
            json!({
                "type": "object",
                "properties": {
                    "start_date": {"type": "string", "description": "YYYYMMDD"},
                    "end_date": {"type": "string", "description": "YYYYMMDD"},
                    "squad": {"type": "integer", "enum": [34, 35, 42, 43, 54]}
                },
                "required": ["start_date", "end_date"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let a: GetScheduleArgs = args("get_schedule", input)?;
        let schedule = self
            .calendar
            .get_schedule(&a.start_date, &a.end_date, a.squad)
            .await?;
        Ok(serde_json::to_value(schedule).unwrap_or(Value::Null))
    }
}

#[derive(Debug, Deserialize)]
struct CheckSquadArgs {
    squad: u16,
    date: String,
    shift_start: String,
    shift_end: String,
}

pub struct CheckSquadScheduled {
    calendar: Arc<dyn CalendarApi>,
}

#[async_trait]
impl Tool for CheckSquadScheduled {
    fn definition(&self) -> ToolDefinition {
        function(
            "check_squad_scheduled",
            "Whether a squad currently has an available crew for an exact shift window.",
            json!({
                "type": "object",
                "properties": {
                    "squad": {"type": "integer", "enum": [34, 35, 42, 43, 54]},
                    "date": {"type": "string", "description": "YYYYMMDD"},
                    "shift_start": {"type": "string", "description": "HHMM"},
                    "shift_end": {"type": "string", "description": "HHMM"}
                },
                "required": ["squad", "date", "shift_start", "shift_end"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let a: CheckSquadArgs = args("check_squad_scheduled", input)?;
        let schedule = self
            .calendar
            .get_schedule(&a.date, &a.date, Some(a.squad))
            .await?;
        let scheduled =
            schedule.is_scheduled(a.squad, &a.date, &hhmm(&a.shift_start), &hhmm(&a.shift_end));
        Ok(json!({ "scheduled": scheduled }))
    }
}

#[derive(Debug, Deserialize)]
struct CountCrewsArgs {
    date: String,
    shift_start: String,
    shift_end: String,
    #[serde(default)]
    excluding_squad: Option<u16>,
}

pub struct CountActiveCrews {
    calendar: Arc<dyn CalendarApi>,
}

#[async_trait]
impl Tool for CountActiveCrews {
    fn definition(&self) -> ToolDefinition {
        function(
            "count_active_crews",
            "Count crews available for a shift window. Pass excluding_squad to simulate removing that squad.",
            json!({
                "type": "object",
                "properties": {
                    "date": {"type": "string", "description": "YYYYMMDD"},
                    "shift_start": {"type": "string", "description": "HHMM"},
                    "shift_end": {"type": "string", "description": "HHMM"},
                    "excluding_squad": {"type": "integer", "enum": [34, 35, 42, 43, 54]}
                },
                "required": ["date", "shift_start", "shift_end"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let a: CountCrewsArgs = args("count_active_crews", input)?;
        let schedule = self.calendar.get_schedule(&a.date, &a.date, None).await?;
        let count = schedule.count_available(
            &a.date,
            &hhmm(&a.shift_start),
            &hhmm(&a.shift_end),
            a.excluding_squad,
        );
        Ok(json!({ "active_crews": count }))
    }
}

#[derive(Debug, Deserialize)]
struct ParseTimeArgs {
    time_reference: String,
}

/// Resolves phrases against the message's local date rather than wall-clock time.
pub struct ParseTimeReference {
    today: NaiveDate,
}

#[async_trait]
impl Tool for ParseTimeReference {
    fn definition(&self) -> ToolDefinition {
        function(
            "parse_time_reference",
            "Resolve a phrase such as 'tonight' or 'Saturday morning' to a date and shift window.",
            json!({
                "type": "object",
                "properties": {
                    "time_reference": {"type": "string"}
                },
                "required": ["time_reference"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let a: ParseTimeArgs = args("parse_time_reference", input)?;
        let resolved = resolve_reference(&a.time_reference, self.today);
        Ok(serde_json::to_value(resolved).unwrap_or(Value::Null))
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// The four schedule tools, bound to one message's local date.
    pub fn for_calendar(calendar: Arc<dyn CalendarApi>, today: NaiveDate) -> Self {
        let mut registry = Self::default();
        registry.register(GetSchedule {
            calendar: calendar.clone(),
        });
        registry.register(CheckSquadScheduled {
            calendar: calendar.clone(),
        });
        registry.register(CountActiveCrews { calendar });
        registry.register(ParseTimeReference { today });
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(Box::new(tool));
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(input).await
    }

    /// Runs one model tool call. Failures are reported back to the model as `{"error": ...}`.
    pub async fn run_call(&self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        let input = match serde_json::from_str::<Value>(&call.function.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = name, error = %e, "tool arguments are not JSON");
                return json!({ "error": format!("arguments are not valid JSON: {}", e) }).to_string();
            }
        };
        info!(tool = name, arguments = %call.function.arguments, "running tool");
        match self.execute(name, input).await {
            Ok(value) => value.to_string(),
            Err(e) => {
                warn!(tool = name, error = %e, "tool failed");
                json!({ "error": e.to_string() }).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalendarError;
    use crate::models::schedule::Schedule;
    use crate::models::shift::CalendarCommand;

    struct StaticCalendar;

    #[async_trait]
    impl CalendarApi for StaticCalendar {
        async fn send_command(&self, _command: &CalendarCommand) -> Result<Value, CalendarError> {
            Ok(json!({}))
        }

        async fn get_schedule(
            &self,
            _start: &str,
            _end: &str,
            _squad: Option<u16>,
        ) -> Result<Schedule, CalendarError> {
            Ok(serde_json::from_value(json!({"dates": [{"date": "20260103", "shifts": [
                {"squad": 42, "shift_start": "1800", "shift_end": "0600", "crew_status": "available"},
                {"squad": 54, "shift_start": "1800", "shift_end": "0600", "crew_status": "available"}
            ]}]}))
            .unwrap())
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::for_calendar(
            Arc::new(StaticCalendar),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
    }

    #[test]
    fn registers_four_tools() {
        let names: Vec<_> = registry()
            .definitions()
            .iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(
            names,
            vec!["get_schedule", "check_squad_scheduled", "count_active_crews", "parse_time_reference"]
        );
    }

    #[test]
    fn registering_same_name_replaces_the_tool() {
        let mut registry = registry();
        assert_eq!(registry.len(), 4);
        registry.register(ParseTimeReference {
            today: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        });
        assert_eq!(registry.len(), 4);
        assert!(!registry.is_empty());
        assert_eq!(registry.definitions()[3].function.name, "parse_time_reference");
    }

    #[tokio::test]
    async fn counts_crews_excluding_squad() {
        let value = registry()
            .execute(
                "count_active_crews",
                json!({"date": "20260103", "shift_start": "1800", "shift_end": "0600", "excluding_squad": 42}),
            )
            .await
            .unwrap();
        assert_eq!(value["active_crews"], 1);
    }

    #[tokio::test]
    async fn resolves_time_reference_against_message_date() {
        let value = registry()
            .execute("parse_time_reference", json!({"time_reference": "Saturday morning"}))
            .await
            .unwrap();
        assert_eq!(value["date"], "20260103");
        assert_eq!(value["shift_start"], "0600");
    }

    #[tokio::test]
    async fn bad_calls_become_error_payloads() {
        let registry = registry();
        let call = ToolCall {
            id: "c1".to_string(),
            kind: "function".to_string(),
            function: crate::clients::openai_client::FunctionCall {
                name: "delete_everything".to_string(),
                arguments: "{}".to_string(),
            },
        };
        let reply: Value = serde_json::from_str(&registry.run_call(&call).await).unwrap();
        assert!(reply["error"].as_str().unwrap().contains("unknown tool"));
    }
}
