#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use shiftBot::clients::calendar_client::CalendarApi;
use shiftBot::clients::groupme_client::{MessageSender, MessageSource};
use shiftBot::clients::openai_client::{ChatMessage, FunctionCall, ToolCall, ToolDefinition};
use shiftBot::config::{AppConfig, Settings};
use shiftBot::error::{CalendarError, ChatError, LlmError};
use shiftBot::models::message::{IncomingMessage, InboundRecord};
use shiftBot::models::roster::{Role, Roster, RosterMember};
use shiftBot::models::schedule::Schedule;
use shiftBot::models::shift::CalendarCommand;
use shiftBot::service::openai_service::OpenAIClient;
use shiftBot::service::pipeline::Pipeline;

/// Shared, ordered record of side effects across fakes.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct FakeOpenAI {
    json_replies: Mutex<VecDeque<Result<String, String>>>,
    chat_replies: Mutex<VecDeque<ChatMessage>>,
    final_answer: String,
    pub json_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub tools_offered: Mutex<Vec<usize>>,
}

impl FakeOpenAI {
    pub fn replying(replies: Vec<Result<String, String>>) -> Self {
        Self {
            json_replies: Mutex::new(replies.into()),
            chat_replies: Mutex::new(VecDeque::new()),
            final_answer: String::new(),
            json_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            tools_offered: Mutex::new(Vec::new()),
        }
    }

    /// Scripted tool-enabled turns, then `final_answer` whenever tools are withheld.
    /// With an empty script the fake keeps calling tools for as long as they are offered.
    pub fn agent(script: Vec<ChatMessage>, final_answer: &str) -> Self {
        Self {
            chat_replies: Mutex::new(script.into()),
            final_answer: final_answer.to_string(),
            ..Self::replying(Vec::new())
        }
    }

    pub fn total_calls(&self) -> usize {
        self.json_calls.load(Ordering::SeqCst) + self.chat_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OpenAIClient for FakeOpenAI {
    async fn complete_json(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
        self.json_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.json_replies.lock().unwrap().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(body)) => Err(LlmError::Status { status: 500, body }),
            None => Err(LlmError::EmptyResponse),
        }
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.tools_offered.lock().unwrap().push(tools.len());
        if let Some(first) = messages.first() {
            self.prompts.lock().unwrap().push(first.text().to_string());
        }
        if tools.is_empty() {
            return Ok(assistant(&self.final_answer));
        }
        if let Some(reply) = self.chat_replies.lock().unwrap().pop_front() {
            return Ok(reply);
        }
        Ok(tool_call(
            "count_active_crews",
            json!({"date": "20260103", "shift_start": "1800", "shift_end": "0600"}),
        ))
    }
}

pub fn assistant(text: &str) -> ChatMessage {
    ChatMessage {
        role: "assistant".to_string(),
        content: Some(text.to_string()),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

pub fn tool_call(name: &str, arguments: Value) -> ChatMessage {
    ChatMessage {
        role: "assistant".to_string(),
        content: None,
        tool_calls: vec![ToolCall {
            id: format!("call_{}", name),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }],
        tool_call_id: None,
    }
}

pub struct FakeCalendar {
    failures: Mutex<VecDeque<CalendarError>>,
    schedule: Option<Schedule>,
    journal: Journal,
    pub attempts: AtomicUsize,
    pub sent: Mutex<Vec<CalendarCommand>>,
    pub schedule_queries: AtomicUsize,
}

impl FakeCalendar {
    pub fn new(journal: Journal) -> Self {
        Self {
            failures: Mutex::new(VecDeque::new()),
            schedule: Some(Schedule::default()),
            journal,
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            schedule_queries: AtomicUsize::new(0),
        }
    }

    /// Errors handed out, in order, before commands start succeeding.
    pub fn failing_with(mut self, failures: Vec<CalendarError>) -> Self {
        self.failures = Mutex::new(failures.into());
        self
    }

    pub fn with_schedule(mut self, schedule: Value) -> Self {
        self.schedule = Some(serde_json::from_value(schedule).unwrap());
        self
    }

    pub fn without_schedule(mut self) -> Self {
        self.schedule = None;
        self
    }

    pub fn sent(&self) -> Vec<CalendarCommand> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarApi for FakeCalendar {
    async fn send_command(&self, command: &CalendarCommand) -> Result<Value, CalendarError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.journal
            .lock()
            .unwrap()
            .push(format!("calendar: {}", command.describe()));
        self.sent.lock().unwrap().push(command.clone());
        Ok(json!({"status": "success"}))
    }

    async fn get_schedule(
        &self,
        _start_date: &str,
        _end_date: &str,
        _squad: Option<u16>,
    ) -> Result<Schedule, CalendarError> {
        self.schedule_queries.fetch_add(1, Ordering::SeqCst);
        self.schedule
            .clone()
            .ok_or_else(|| CalendarError::Transient("schedule service down".to_string()))
    }
}

pub struct FakeChat {
    journal: Journal,
    pub posts: Mutex<Vec<String>>,
}

impl FakeChat {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            posts: Mutex::new(Vec::new()),
        }
    }

    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for FakeChat {
    async fn send_message(&self, _group_id: &str, content: &str) -> Result<(), ChatError> {
        self.journal.lock().unwrap().push(format!("chat: {}", content));
        self.posts.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

/// Group history, newest first like the real endpoint.
pub struct FakeSource {
    pub records: Mutex<Vec<InboundRecord>>,
}

impl FakeSource {
    pub fn new(records: Vec<InboundRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn push_newest(&self, record: InboundRecord) {
        self.records.lock().unwrap().insert(0, record);
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<InboundRecord>, ChatError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().take(limit as usize).cloned().collect())
    }
}

pub fn roster() -> Roster {
    Roster::from_members(vec![
        RosterMember {
            name: "Katie Sowden".to_string(),
            role: Role::Chief,
            squad: 42,
        },
        RosterMember {
            name: "George Nowakowski".to_string(),
            role: Role::Chief,
            squad: 43,
        },
        RosterMember {
            name: "Dana Ortiz".to_string(),
            role: Role::Member,
            squad: 54,
        },
    ])
    .unwrap()
}

pub fn settings(overrides: &[(&str, &str)]) -> Settings {
    let mut pairs = vec![
        ("OPENAI_API_KEY", "test-key"),
        ("AI_MODE", "simple"),
        ("CONFIDENCE_THRESHOLD", "70"),
        ("DISPATCH_MAX_ATTEMPTS", "3"),
        ("DISPATCH_BACKOFF_MS", "1"),
        ("TIMEZONE", "America/New_York"),
        ("POST_CONFIRMATIONS", "false"),
        ("SHIFT_KEYWORDS", "crew,shift,squad,tonight,tomorrow,morning,afternoon,evening,saturday,sunday,monday,tuesday,wednesday,thursday,friday,staffed,no crew,covering"),
    ];
    for &(key, value) in overrides {
        pairs.retain(|(k, _)| *k != key);
        pairs.push((key, value));
    }
    Settings::from_config(&AppConfig::from_pairs(pairs)).unwrap()
}

pub fn pipeline(
    settings: &Settings,
    openai: Arc<FakeOpenAI>,
    calendar: Arc<FakeCalendar>,
    chat: Option<Arc<FakeChat>>,
) -> Pipeline {
    Pipeline::new(
        settings,
        Arc::new(roster()),
        openai,
        calendar,
        chat.map(|c| c as Arc<dyn MessageSender>),
    )
}

pub fn message(id: &str, sender: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        id: id.to_string(),
        sender_name: sender.to_string(),
        text: text.to_string(),
        // 2026-01-01 14:00 UTC, a Thursday morning in New York.
        created_at: 1_767_276_000,
        group_id: "station95".to_string(),
        preview: false,
    }
}

pub fn record(id: &str, sender: &str, text: &str) -> InboundRecord {
    serde_json::from_value(json!({
        "id": id,
        "name": sender,
        "text": text,
        "created_at": 1_767_276_000,
        "group_id": "station95",
        "sender_type": "user",
        "system": false
    }))
    .unwrap()
}

pub fn interpretation(requests: Value) -> String {
    json!({
        "is_shift_request": true,
        "requests": requests,
        "reasoning": "scripted"
    })
    .to_string()
}

pub fn request(action: &str, squad: u16, date: &str, start: &str, end: &str, confidence: u8) -> Value {
    json!({
        "action": action,
        "squad": squad,
        "date": date,
        "shift_start": start,
        "shift_end": end,
        "confidence": confidence,
        "reasoning": "scripted"
    })
}

/// One request as the scripted responder saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub line: String,
    pub headers: String,
    pub body: String,
}

/// Minimal HTTP responder: answers each connection with the next scripted status and body.
pub async fn responder(script: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        for (status, body) in script {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let head_end = loop {
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break buf.len();
                }
                buf.extend_from_slice(&chunk[..n]);
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < head_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let request_body = String::from_utf8_lossy(&buf[head_end..]).to_string();
            seen.lock().unwrap().push(SeenRequest {
                line: head.lines().next().unwrap_or_default().to_string(),
                headers: head.clone(),
                body: request_body,
            });

            let response = format!(
                "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{}/v1", addr), requests)
}
