use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

use crate::models::roster::Role;
use crate::models::shift::VALID_SQUADS;
use crate::service::time_vocab::render_table;

pub const INTERPRET_SYSTEM: &str = "You are a precise shift management interpreter for a rescue squad. \
You reply ONLY with a single JSON object matching the requested shape, with no markdown, no backticks, and no extra text.";

pub const AGENT_FINALIZE: &str = "Based on the tool results above, provide your complete analysis as a single JSON object \
in exactly the shape specified in the system prompt. Do not call any more tools.";

/// Everything the model is told about one message.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub sender_name: String,
    pub sender_squad: u16,
    pub sender_role: Role,
    pub message_text: String,
    pub message_time: DateTime<Tz>,
    pub current_date: NaiveDate,
}

fn squad_list() -> String {
    VALID_SQUADS
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn request_shape(with_warnings: bool) -> String {
    let warnings = if with_warnings {
        ",\n  \"warnings\": [\"<string>\"],\n  \"critical_warnings\": [\"<string>\"]"
    } else {
        ""
    };
    format!(
        "{{\n  \"is_shift_request\": <bool>,\n  \"requests\": [\n    {{\"action\": \"noCrew\" | \"addShift\" | \"obliterateShift\", \
\"squad\": <one of {squads}>, \"date\": \"YYYYMMDD\", \"shift_start\": \"HHMM\", \"shift_end\": \"HHMM\", \
\"confidence\": <0-100>, \"reasoning\": \"<string>\"}}\n  ]{warnings},\n  \"reasoning\": \"<string>\"\n}}",
        squads = squad_list(),
        warnings = warnings,
    )
}

fn rules(ctx: &PromptContext) -> String {
    format!(
        "Rules:\n\
         1. If no squad is named in the message, use the sender's squad ({squad}). If another squad is named explicitly, use that squad.\n\
         2. A single message may describe several shift changes; emit one entry in \"requests\" per change, in the order they appear.\n\
         3. Resolve colloquial times with this table:\n{table}\
         4. \"tonight\" means the evening window on the message date. \"tomorrow\" is the day after the message date.\n\
         5. Weekday names mean the next occurrence strictly after the message date (if the message is sent on a Saturday, \"Saturday\" means one week later).\n\
         6. Dates are always in the future: a month/day that already passed this year means next year.\n\
         7. \"midnight\" is 0000 and \"noon\" is 1200. When a window crosses midnight the end time belongs to the next day; keep the date of the start.\n\
         8. Actions: noCrew = the squad has no crew for the window; addShift = the squad will cover the window; obliterateShift = remove the shift from the calendar entirely.\n\
         9. Only include entries you are confident about (confidence > 0). Set is_shift_request to false, with an empty \"requests\" list, for greetings, casual talk or off-topic messages.\n\
         10. Output ONLY raw JSON with exactly the fields shown; do not add fields.\n",
        squad = ctx.sender_squad,
        table = render_table(),
    )
}

fn context_block(ctx: &PromptContext) -> String {
    format!(
        "Message details:\n\
         - Sender: {sender}\n\
         - Sender's squad: {squad}\n\
         - Sender's role: {role}\n\
         - Message sent at (local time): {sent}\n\
         - Current date: {today}\n\
         - Valid squads: {squads}\n",
        sender = ctx.sender_name,
        squad = ctx.sender_squad,
        role = ctx.sender_role,
        sent = ctx.message_time.format("%Y-%m-%d %H:%M:%S (%A)"),
        today = ctx.current_date.format("%Y-%m-%d (%A)"),
        squads = squad_list(),
    )
}

/// Prompt for the single-call interpretation. Identical inputs give identical text.
pub fn interpretation_prompt(ctx: &PromptContext) -> String {
    format!(
        "You are a rescue squad shift management assistant. Analyze the group chat message below and extract shift change requests.\n\n\
         {context}\n\
         Message: \"{text}\"\n\n\
         {rules}\n\
         The JSON shape must be exactly:\n{shape}\n",
        context = context_block(ctx),
        text = ctx.message_text,
        rules = rules(ctx),
        shape = request_shape(false),
    )
}

/// System prompt for the tool-calling workflow.
pub fn agent_system_prompt(ctx: &PromptContext, max_tool_rounds: usize) -> String {
    format!(
        "You are an intelligent rescue squad shift management assistant.\n\n\
         {context}\n\
         Use the available tools (at most {rounds} rounds) to check the current schedule before answering:\n\
         - get_schedule: schedule for a date range, optionally for one squad\n\
         - check_squad_scheduled: whether a squad is scheduled for a window\n\
         - count_active_crews: how many crews cover a window, optionally excluding a squad\n\
         - parse_time_reference: resolve phrases such as \"Saturday morning\" to a date and window\n\n\
         If removing a crew would leave zero crews on duty, add a critical warning. If the sender expects a squad \
         to be scheduled and it is not (or the reverse), add a warning.\n\n\
         {rules}\n\
         When you are done with tools, reply with a JSON object of exactly this shape:\n{shape}\n",
        context = context_block(ctx),
        rounds = max_tool_rounds,
        rules = rules(ctx),
        shape = request_shape(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> PromptContext {
        let tz: Tz = chrono_tz::America::New_York;
        PromptContext {
            sender_name: "Katie Sowden".to_string(),
            sender_squad: 42,
            sender_role: Role::Chief,
            message_text: "42 does not have a crew tonight from 1800 - midnight".to_string(),
            message_time: tz.with_ymd_and_hms(2026, 1, 1, 9, 30, 0).unwrap(),
            current_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        }
    }

    #[test]
    fn interpretation_prompt_is_deterministic() {
        assert_eq!(interpretation_prompt(&ctx()), interpretation_prompt(&ctx()));
    }

    #[test]
    fn interpretation_prompt_embeds_inputs() {
        let prompt = interpretation_prompt(&ctx());
        assert!(prompt.contains("Sender: Katie Sowden"));
        assert!(prompt.contains("Sender's squad: 42"));
        assert!(prompt.contains("Sender's role: Chief"));
        assert!(prompt.contains("2026-01-01 09:30:00 (Thursday)"));
        assert!(prompt.contains("1800 - midnight"));
        assert!(prompt.contains("| morning | 0600 | 1800 |"));
        assert!(prompt.contains("34, 35, 42, 43, 54"));
        assert!(!prompt.contains("critical_warnings"));
    }

    #[test]
    fn agent_prompt_asks_for_warnings() {
        let prompt = agent_system_prompt(&ctx(), 5);
        assert!(prompt.contains("critical_warnings"));
        assert!(prompt.contains("at most 5 rounds"));
    }
}
