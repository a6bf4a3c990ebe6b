pub mod poller;
pub mod task_runner;
