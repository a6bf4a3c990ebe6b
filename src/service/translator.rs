use crate::models::shift::CalendarCommand;
use crate::service::time_vocab::format_date;
use crate::service::validation::AcceptedRequest;

/// Projects a validated request onto the calendar's command shape.
pub fn to_command(request: &AcceptedRequest, preview: bool) -> CalendarCommand {
    CalendarCommand {
        action: request.action,
        squad: request.squad,
        date: format_date(request.date),
        shift_start: request.shift_start.clone(),
        shift_end: request.shift_end.clone(),
        preview,
    }
}

pub fn to_commands(requests: &[AcceptedRequest], preview: bool) -> Vec<CalendarCommand> {
    requests.iter().map(|r| to_command(r, preview)).collect()
}
