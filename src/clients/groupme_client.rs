use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ChatError;
use crate::models::message::InboundRecord;

const BOT_POST_URL: &str = "https://api.groupme.com/v3/bots/post";
const GROUPS_URL: &str = "https://api.groupme.com/v3/groups";
const POST_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub fn format_warning(text: &str) -> String {
    format!("⚠️ WARNING ⚠️\n{}", text)
}

pub fn format_critical(text: &str) -> String {
    format!("🚨 CRITICAL ALERT 🚨\n{}", text)
}

/// Outbound plain-text posts to a group chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, group_id: &str, content: &str) -> Result<(), ChatError>;
}

/// Recent history of the watched group, newest first.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<InboundRecord>, ChatError>;
}

#[derive(Debug, Serialize)]
struct BotPost<'a> {
    bot_id: &'a str,
    text: &'a str,
}

/// Posts as a GroupMe bot. A bot belongs to exactly one group, so `group_id` is informational.
#[derive(Debug, Clone)]
pub struct GroupMeBot {
    http: reqwest::Client,
    bot_id: String,
}

impl GroupMeBot {
    pub fn new(bot_id: String) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().timeout(POST_TIMEOUT).build()?;
        Ok(Self { http, bot_id })
    }
}

#[async_trait]
impl MessageSender for GroupMeBot {
    async fn send_message(&self, group_id: &str, content: &str) -> Result<(), ChatError> {
        info!(group_id, chars = content.len(), "posting to group chat");
        let response = self
            .http
            .post(BOT_POST_URL)
            .json(&BotPost {
                bot_id: &self.bot_id,
                text: content,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    meta: Option<HistoryMeta>,
    #[serde(default)]
    response: Option<HistoryResponse>,
}

#[derive(Debug, Deserialize)]
struct HistoryMeta {
    code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<InboundRecord>,
}

#[derive(Debug, Clone)]
pub struct GroupMeHistory {
    http: reqwest::Client,
    api_token: String,
    group_id: String,
}

impl GroupMeHistory {
    pub fn new(api_token: String, group_id: String) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_token,
            group_id,
        })
    }
}

#[async_trait]
impl MessageSource for GroupMeHistory {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<InboundRecord>, ChatError> {
        let url = format!("{}/{}/messages", GROUPS_URL, self.group_id);
        let limit = limit.clamp(1, 100).to_string();
        let response = self
            .http
            .get(&url)
            .query(&[("token", self.api_token.as_str()), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        // GroupMe answers 304 when the group has no messages at all.
        if status == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(Vec::new());
        }
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: HistoryEnvelope = serde_json::from_str(&text).map_err(|_| {
            ChatError::Status {
                status: status.as_u16(),
                body: text.clone(),
            }
        })?;
        let code = envelope.meta.and_then(|m| m.code);
        if code != Some(200) {
            return Err(ChatError::MetaCode(code));
        }
        let messages = envelope.response.map(|r| r.messages).unwrap_or_default();
        debug!(count = messages.len(), "fetched group history");
        Ok(messages)
    }
}
