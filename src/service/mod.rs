pub mod agentic;
pub mod dispatcher;
pub mod filter;
pub mod interpreter;
pub mod openai_service;
pub mod pipeline;
pub mod prompts;
pub mod time_vocab;
pub mod tools;
pub mod translator;
pub mod validation;
