use serde::{Deserialize, Serialize};

/// Squads that can appear on the calendar. Anything else is rejected before dispatch.
pub const VALID_SQUADS: [u16; 5] = [34, 35, 42, 43, 54];

pub fn is_valid_squad(squad: u16) -> bool {
    VALID_SQUADS.contains(&squad)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftAction {
    #[serde(rename = "noCrew")]
    NoCrew,
    #[serde(rename = "addShift")]
    AddShift,
    #[serde(rename = "obliterateShift")]
    ObliterateShift,
}

impl ShiftAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftAction::NoCrew => "noCrew",
            ShiftAction::AddShift => "addShift",
            ShiftAction::ObliterateShift => "obliterateShift",
        }
    }

    /// Actions that take a crew off the schedule.
    pub fn is_removal(&self) -> bool {
        matches!(self, ShiftAction::NoCrew | ShiftAction::ObliterateShift)
    }
}

impl std::fmt::Display for ShiftAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One shift change as reported by the model. Untrusted until validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiftChangeRequest {
    pub action: ShiftAction,
    pub squad: u16,
    pub date: String,
    pub shift_start: String,
    pub shift_end: String,
    pub confidence: u8,
    #[serde(default)]
    pub reasoning: String,
}

/// Structured model output for a single chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Interpretation {
    pub is_shift_request: bool,
    #[serde(default)]
    pub requests: Vec<ShiftChangeRequest>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub critical_warnings: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// Identifies a squad's coverage window on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub squad: u16,
    pub date: String,
    pub shift_start: String,
    pub shift_end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarCommand {
    pub action: ShiftAction,
    pub squad: u16,
    pub date: String,
    pub shift_start: String,
    pub shift_end: String,
    #[serde(default)]
    pub preview: bool,
}

impl CalendarCommand {
    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("action", self.action.as_str().to_string()),
            ("date", self.date.clone()),
            ("shift_start", self.shift_start.clone()),
            ("shift_end", self.shift_end.clone()),
            ("squad", self.squad.to_string()),
            ("preview", if self.preview { "True" } else { "False" }.to_string()),
        ]
    }

    pub fn window(&self) -> WindowKey {
        WindowKey {
            squad: self.squad,
            date: self.date.clone(),
            shift_start: self.shift_start.clone(),
            shift_end: self.shift_end.clone(),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} for squad {} on {} ({}-{})",
            self.action, self.squad, self.date, self.shift_start, self.shift_end
        )
    }
}
