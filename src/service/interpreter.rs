use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::error::InterpretError;
use crate::models::message::IncomingMessage;
use crate::models::roster::RosterMember;
use crate::models::shift::Interpretation;
use crate::service::openai_service::OpenAIClient;
use crate::service::prompts::{interpretation_prompt, PromptContext, INTERPRET_SYSTEM};

/// Builds the prompt context for a message, rendering times in the station's timezone.
pub fn prompt_context(
    timezone: Tz,
    member: &RosterMember,
    message: &IncomingMessage,
    now: DateTime<Utc>,
) -> PromptContext {
    let sent = Utc
        .timestamp_opt(message.created_at, 0)
        .single()
        .unwrap_or(now);
    PromptContext {
        sender_name: message.sender_name.clone(),
        sender_squad: member.squad,
        sender_role: member.role,
        message_text: message.text.clone(),
        message_time: sent.with_timezone(&timezone),
        current_date: now.with_timezone(&timezone).date_naive(),
    }
}

/// Strictly decodes model output into an [`Interpretation`].
///
/// Anything outside the schema fails the whole message; entries with zero confidence
/// are dropped, and a request list under `is_shift_request: false` flips the flag.
pub fn parse_interpretation(raw: &str) -> Result<Interpretation, InterpretError> {
    let malformed = |reason: String| InterpretError::MalformedOutput {
        reason,
        raw: raw.to_string(),
    };

    let start = raw.find('{').ok_or_else(|| malformed("no JSON object".to_string()))?;
    let end = raw.rfind('}').ok_or_else(|| malformed("no JSON object".to_string()))?;
    if end < start {
        return Err(malformed("no JSON object".to_string()));
    }

    let mut interpretation: Interpretation =
        serde_json::from_str(&raw[start..=end]).map_err(|e| malformed(e.to_string()))?;

    if let Some(bad) = interpretation.requests.iter().find(|r| r.confidence > 100) {
        return Err(malformed(format!("confidence {} out of range", bad.confidence)));
    }
    interpretation.requests.retain(|r| r.confidence > 0);

    if !interpretation.requests.is_empty() && !interpretation.is_shift_request {
        warn!(
            requests = interpretation.requests.len(),
            "model returned requests with is_shift_request=false; treating as a shift request"
        );
        interpretation.is_shift_request = true;
    }
    Ok(interpretation)
}

pub struct InterpretationEngine {
    openai: Arc<dyn OpenAIClient>,
}

impl InterpretationEngine {
    pub fn new(openai: Arc<dyn OpenAIClient>) -> Self {
        Self { openai }
    }

    pub async fn interpret(&self, ctx: &PromptContext) -> Result<Interpretation, InterpretError> {
        let prompt = interpretation_prompt(ctx);
        let raw = self.openai.complete_json(INTERPRET_SYSTEM, &prompt).await?;
        let interpretation = parse_interpretation(&raw)?;
        info!(
            sender = %ctx.sender_name,
            is_shift_request = interpretation.is_shift_request,
            requests = interpretation.requests.len(),
            "interpretation complete"
        );
        Ok(interpretation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shift::ShiftAction;

    #[test]
    fn parses_multi_request_output() {
        let raw = r#"{"is_shift_request":true,"requests":[
            {"action":"noCrew","squad":42,"date":"20260101","shift_start":"1800","shift_end":"midnight","confidence":92,"reasoning":"tonight"},
            {"action":"addShift","squad":43,"date":"20260103","shift_start":"0600","shift_end":"1800","confidence":80,"reasoning":"saturday"}
        ],"reasoning":"two changes"}"#;
        let parsed = parse_interpretation(raw).unwrap();
        assert_eq!(parsed.requests.len(), 2);
        assert_eq!(parsed.requests[0].action, ShiftAction::NoCrew);
        assert_eq!(parsed.requests[1].squad, 43);
    }

    #[test]
    fn tolerates_code_fences_but_not_schema_drift() {
        let fenced = "```json\n{\"is_shift_request\":false,\"requests\":[],\"reasoning\":\"hi\"}\n```";
        assert!(!parse_interpretation(fenced).unwrap().is_shift_request);

        let drift = r#"{"is_shift_request":true,"action":"noCrew","squad":42}"#;
        assert!(matches!(
            parse_interpretation(drift),
            Err(InterpretError::MalformedOutput { .. })
        ));
        assert!(parse_interpretation("I think squad 42 is out").is_err());
    }

    #[test]
    fn rejects_unknown_action_and_out_of_range_confidence() {
        let unknown = r#"{"is_shift_request":true,"requests":[{"action":"swapShift","squad":42,"date":"20260101","shift_start":"1800","shift_end":"0600","confidence":90}]}"#;
        assert!(parse_interpretation(unknown).is_err());

        let too_sure = r#"{"is_shift_request":true,"requests":[{"action":"noCrew","squad":42,"date":"20260101","shift_start":"1800","shift_end":"0600","confidence":150}]}"#;
        assert!(parse_interpretation(too_sure).is_err());
    }

    #[test]
    fn drops_zero_confidence_and_fixes_contradiction() {
        let raw = r#"{"is_shift_request":false,"requests":[
            {"action":"noCrew","squad":42,"date":"20260101","shift_start":"1800","shift_end":"0600","confidence":0},
            {"action":"noCrew","squad":54,"date":"20260103","shift_start":"0600","shift_end":"1800","confidence":75}
        ]}"#;
        let parsed = parse_interpretation(raw).unwrap();
        assert!(parsed.is_shift_request);
        assert_eq!(parsed.requests.len(), 1);
        assert_eq!(parsed.requests[0].squad, 54);
    }
}
