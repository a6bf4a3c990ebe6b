pub mod calendar_client;
pub mod groupme_client;
pub mod openai_client;
