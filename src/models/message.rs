use serde::{Deserialize, Serialize};

/// Raw chat record as delivered by the webhook or returned by the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub sender_type: String,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeSkip {
    System,
    Bot,
}

impl IntakeSkip {
    pub fn reason(&self) -> &'static str {
        match self {
            IntakeSkip::System => "system message",
            IntakeSkip::Bot => "bot message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomingMessage {
    pub id: String,
    pub sender_name: String,
    pub text: String,
    pub created_at: i64,
    pub group_id: String,
    pub preview: bool,
}

impl InboundRecord {
    /// System notices and our own bot posts never enter the pipeline.
    pub fn into_message(self) -> Result<IncomingMessage, IntakeSkip> {
        if self.system {
            return Err(IntakeSkip::System);
        }
        if self.sender_type == "bot" {
            return Err(IntakeSkip::Bot);
        }
        Ok(IncomingMessage {
            id: self.id,
            sender_name: self.name,
            text: self.text.unwrap_or_default(),
            created_at: self.created_at,
            group_id: self.group_id,
            preview: self.preview,
        })
    }
}
