use serde::{Deserialize, Serialize};

pub const CREW_AVAILABLE: &str = "available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledShift {
    pub squad: u16,
    pub shift_start: String,
    pub shift_end: String,
    #[serde(default)]
    pub crew_status: String,
}

impl ScheduledShift {
    pub fn is_available(&self) -> bool {
        self.crew_status.eq_ignore_ascii_case(CREW_AVAILABLE)
    }

    fn covers(&self, shift_start: &str, shift_end: &str) -> bool {
        self.shift_start == shift_start && self.shift_end == shift_end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub date: String,
    #[serde(default)]
    pub shifts: Vec<ScheduledShift>,
}

/// Calendar state as returned by `action=getSchedule`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub dates: Vec<ScheduleDay>,
}

impl Schedule {
    pub fn shifts_on<'a>(&'a self, date: &'a str) -> impl Iterator<Item = &'a ScheduledShift> + 'a {
        self.dates
            .iter()
            .filter(move |day| day.date == date)
            .flat_map(|day| day.shifts.iter())
    }

    /// Crews with an available status in exactly this window, optionally ignoring one squad.
    pub fn count_available(
        &self,
        date: &str,
        shift_start: &str,
        shift_end: &str,
        excluding_squad: Option<u16>,
    ) -> usize {
        self.shifts_on(date)
            .filter(|s| s.covers(shift_start, shift_end))
            .filter(|s| s.is_available())
            .filter(|s| Some(s.squad) != excluding_squad)
            .count()
    }

    pub fn is_scheduled(&self, squad: u16, date: &str, shift_start: &str, shift_end: &str) -> bool {
        self.shifts_on(date)
            .any(|s| s.squad == squad && s.covers(shift_start, shift_end) && s.is_available())
    }
}
