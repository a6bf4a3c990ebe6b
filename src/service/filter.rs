use crate::models::message::IncomingMessage;
use crate::models::roster::{Roster, RosterMember};

pub const DEFAULT_KEYWORDS: [&str; 18] = [
    "crew",
    "shift",
    "squad",
    "tonight",
    "tomorrow",
    "morning",
    "afternoon",
    "evening",
    "saturday",
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "staffed",
    "no crew",
    "covering",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision<'a> {
    Eligible(&'a RosterMember),
    UnknownSender,
    NoKeywords,
}

impl FilterDecision<'_> {
    pub fn reason(&self) -> &'static str {
        match self {
            FilterDecision::Eligible(_) => "eligible",
            FilterDecision::UnknownSender => "sender not on roster",
            FilterDecision::NoKeywords => "no shift keywords",
        }
    }
}

/// Decides whether a message is worth an LLM call.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    keywords: Vec<String>,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }
}

impl EligibilityFilter {
    pub fn new(keywords: Vec<String>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn evaluate<'r>(&self, roster: &'r Roster, message: &IncomingMessage) -> FilterDecision<'r> {
        let Some(member) = roster.lookup(&message.sender_name) else {
            return FilterDecision::UnknownSender;
        };
        if !self.has_keywords(&message.text) {
            return FilterDecision::NoKeywords;
        }
        FilterDecision::Eligible(member)
    }

    pub fn has_keywords(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}
