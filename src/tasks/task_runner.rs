use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{error, info};

/// Long-running background jobs started side by side.
#[derive(Default)]
pub struct TaskRunner {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(task = name, "starting task");
        self.tasks.push((name, tokio::spawn(task)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every task. None of them are expected to return.
    pub async fn join_all(self) {
        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => info!(task = name, "task finished"),
                Err(err) => error!(task = name, error = %err, "task panicked"),
            }
        }
    }
}
