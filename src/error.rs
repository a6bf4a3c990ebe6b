use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("invalid config line {line}: {content}")]
    InvalidLine { line: usize, content: String },
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("could not read roster file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse roster file `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("duplicate roster entry `{0}`")]
    DuplicateMember(String),
    #[error("roster entry `{name}` has invalid squad {squad}")]
    InvalidSquad { name: String, squad: u16 },
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to the model failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode model response: {0}")]
    Decode(String),
    #[error("model response had no choices")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("model output did not match the interpretation schema: {reason}")]
    MalformedOutput { reason: String, raw: String },
    #[error("tool loop exceeded {0} rounds without a final answer")]
    ToolLoopExhausted(usize),
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("transient calendar failure: {0}")]
    Transient(String),
    #[error("calendar rejected the request with status {status}: {body}")]
    Permanent { status: u16, body: String },
    #[error("could not decode calendar response: {0}")]
    Decode(String),
}

impl CalendarError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CalendarError::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat api returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("chat api returned meta code {0:?}")]
    MetaCode(Option<u16>),
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("could not read cursor file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not write cursor file `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error("message worker is no longer running")]
    WorkerStopped,
}

/// Fatal errors surfaced by the binary's commands.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("prompt failed: {0}")]
    Prompt(String),
}
