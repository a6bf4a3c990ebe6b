use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use tracing::warn;

use crate::models::shift::{is_valid_squad, Interpretation, ShiftAction, ShiftChangeRequest, WindowKey};
use crate::service::time_vocab::{format_date, normalize_hhmm, parse_date};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotShiftRequest,
    LowConfidence { confidence: u8, threshold: u8 },
    InvalidSquad(u16),
    InvalidDate(String),
    InvalidTime(String),
    ConflictingActions,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotShiftRequest => write!(f, "not a shift request"),
            RejectReason::LowConfidence { confidence, threshold } => {
                write!(f, "low confidence ({} <= {})", confidence, threshold)
            }
            RejectReason::InvalidSquad(squad) => write!(f, "invalid squad {}", squad),
            RejectReason::InvalidDate(date) => write!(f, "invalid date `{}`", date),
            RejectReason::InvalidTime(time) => write!(f, "invalid time `{}`", time),
            RejectReason::ConflictingActions => {
                write!(f, "conflicting actions for the same window")
            }
        }
    }
}

/// A request that passed every check, with normalized date and times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedRequest {
    pub action: ShiftAction,
    pub squad: u16,
    pub date: NaiveDate,
    pub shift_start: String,
    pub shift_end: String,
    pub confidence: u8,
}

impl AcceptedRequest {
    pub fn window(&self) -> WindowKey {
        WindowKey {
            squad: self.squad,
            date: format_date(self.date),
            shift_start: self.shift_start.clone(),
            shift_end: self.shift_end.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub request: ShiftChangeRequest,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateOutcome {
    pub accepted: Vec<AcceptedRequest>,
    pub rejected: Vec<Rejection>,
}

/// Confidence floor plus business rules. Never raises; rejections are for manual review.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdGate {
    threshold: u8,
}

impl ThresholdGate {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn check(
        &self,
        is_shift_request: bool,
        request: &ShiftChangeRequest,
    ) -> Result<AcceptedRequest, RejectReason> {
        if !is_shift_request {
            return Err(RejectReason::NotShiftRequest);
        }
        if request.confidence <= self.threshold {
            return Err(RejectReason::LowConfidence {
                confidence: request.confidence,
                threshold: self.threshold,
            });
        }
        if !is_valid_squad(request.squad) {
            return Err(RejectReason::InvalidSquad(request.squad));
        }
        let date =
            parse_date(&request.date).ok_or_else(|| RejectReason::InvalidDate(request.date.clone()))?;
        let shift_start = normalize_hhmm(&request.shift_start)
            .ok_or_else(|| RejectReason::InvalidTime(request.shift_start.clone()))?;
        let shift_end = normalize_hhmm(&request.shift_end)
            .ok_or_else(|| RejectReason::InvalidTime(request.shift_end.clone()))?;
        Ok(AcceptedRequest {
            action: request.action,
            squad: request.squad,
            date,
            shift_start,
            shift_end,
            confidence: request.confidence,
        })
    }

    pub fn evaluate(&self, interpretation: &Interpretation) -> GateOutcome {
        let mut outcome = GateOutcome::default();
        let mut passed: Vec<(AcceptedRequest, &ShiftChangeRequest)> = Vec::new();

        for request in &interpretation.requests {
            match self.check(interpretation.is_shift_request, request) {
                Ok(accepted) => {
                    let duplicate = passed.iter().any(|(seen, _)| {
                        seen.window() == accepted.window() && seen.action == accepted.action
                    });
                    if !duplicate {
                        passed.push((accepted, request));
                    }
                }
                Err(reason) => outcome.rejected.push(Rejection {
                    request: request.clone(),
                    reason,
                }),
            }
        }

        let mut actions_per_window: HashMap<WindowKey, usize> = HashMap::new();
        for (accepted, _) in &passed {
            *actions_per_window.entry(accepted.window()).or_default() += 1;
        }

        for (accepted, request) in passed {
            // Duplicates are already collapsed, so more than one entry means differing actions.
            if actions_per_window.get(&accepted.window()).copied().unwrap_or(0) > 1 {
                outcome.rejected.push(Rejection {
                    request: request.clone(),
                    reason: RejectReason::ConflictingActions,
                });
            } else {
                outcome.accepted.push(accepted);
            }
        }

        for rejection in &outcome.rejected {
            warn!(
                action = %rejection.request.action,
                squad = rejection.request.squad,
                date = %rejection.request.date,
                confidence = rejection.request.confidence,
                reason = %rejection.reason,
                "request rejected; flag for manual review"
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: ShiftAction, squad: u16, confidence: u8) -> ShiftChangeRequest {
        ShiftChangeRequest {
            action,
            squad,
            date: "20260101".to_string(),
            shift_start: "1800".to_string(),
            shift_end: "midnight".to_string(),
            confidence,
            reasoning: String::new(),
        }
    }

    fn interpretation(requests: Vec<ShiftChangeRequest>) -> Interpretation {
        Interpretation {
            is_shift_request: true,
            requests,
            ..Interpretation::default()
        }
    }

    #[test]
    fn threshold_is_strict() {
        let gate = ThresholdGate::new(70);
        assert_eq!(
            gate.check(true, &request(ShiftAction::NoCrew, 42, 70)),
            Err(RejectReason::LowConfidence { confidence: 70, threshold: 70 })
        );
        let accepted = gate.check(true, &request(ShiftAction::NoCrew, 42, 71)).unwrap();
        assert_eq!(accepted.shift_end, "0000");
    }

    #[test]
    fn rejects_business_rule_violations() {
        let gate = ThresholdGate::new(70);
        assert_eq!(
            gate.check(false, &request(ShiftAction::NoCrew, 42, 99)),
            Err(RejectReason::NotShiftRequest)
        );
        assert_eq!(
            gate.check(true, &request(ShiftAction::NoCrew, 41, 99)),
            Err(RejectReason::InvalidSquad(41))
        );

        let mut bad_date = request(ShiftAction::AddShift, 42, 99);
        bad_date.date = "20260231".to_string();
        assert!(matches!(gate.check(true, &bad_date), Err(RejectReason::InvalidDate(_))));

        let mut bad_time = request(ShiftAction::AddShift, 42, 99);
        bad_time.shift_start = "late".to_string();
        assert!(matches!(gate.check(true, &bad_time), Err(RejectReason::InvalidTime(_))));
    }

    #[test]
    fn conflicting_actions_are_all_rejected() {
        let gate = ThresholdGate::new(70);
        let outcome = gate.evaluate(&interpretation(vec![
            request(ShiftAction::NoCrew, 42, 90),
            request(ShiftAction::AddShift, 42, 90),
            request(ShiftAction::NoCrew, 54, 90),
        ]));
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].squad, 54);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(outcome
            .rejected
            .iter()
            .all(|r| r.reason == RejectReason::ConflictingActions));
    }

    #[test]
    fn exact_duplicates_collapse() {
        let gate = ThresholdGate::new(70);
        let mut second = request(ShiftAction::NoCrew, 42, 95);
        second.shift_end = "0000".to_string();
        let outcome = gate.evaluate(&interpretation(vec![
            request(ShiftAction::NoCrew, 42, 90),
            second,
        ]));
        assert_eq!(outcome.accepted.len(), 1);
        assert!(outcome.rejected.is_empty());
    }
}
