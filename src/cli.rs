use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{Confirm, Text};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::AppError;
use crate::models::message::IncomingMessage;
use crate::runtime;
use crate::service::pipeline::{Pipeline, Preview};

#[derive(Parser)]
#[command(name = "shiftBot", about = "Turns squad chat shift changes into calendar commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server.
    Serve {
        /// Also poll the group history in the background.
        #[arg(long)]
        poll: bool,
    },
    /// Poll the group history once (or forever with --watch).
    Poll {
        #[arg(long)]
        watch: bool,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Forget the last processed message id.
    ResetCursor,
    /// Show what a message would do without touching the calendar.
    Interpret {
        #[arg(long)]
        sender: String,
        text: String,
    },
    /// Type messages interactively and send them through the pipeline.
    Repl,
}

fn local_message(sender: &str, text: &str, preview: bool) -> IncomingMessage {
    IncomingMessage {
        id: Uuid::new_v4().to_string(),
        sender_name: sender.to_string(),
        text: text.to_string(),
        created_at: Utc::now().timestamp(),
        group_id: "local".to_string(),
        preview,
    }
}

pub async fn run(command: Commands, settings: Settings) -> Result<(), AppError> {
    match command {
        Commands::Serve { poll } => {
            let pipeline = runtime::build_pipeline(&settings)?;
            runtime::run_serve(settings, pipeline, poll).await
        }
        Commands::Poll { watch, limit } => {
            let pipeline = runtime::build_pipeline(&settings)?;
            if let Some(summary) = runtime::run_poll(settings, pipeline, watch, limit).await? {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).unwrap_or_default()
                );
            }
            Ok(())
        }
        Commands::ResetCursor => {
            if runtime::reset_cursor(&settings)? {
                println!("Cursor removed. The next poll re-processes the most recent messages.");
            } else {
                println!("No cursor to remove.");
            }
            Ok(())
        }
        Commands::Interpret { sender, text } => {
            let pipeline = runtime::build_pipeline(&settings)?;
            print_preview(pipeline.preview_at(&local_message(&sender, &text, true), Utc::now()).await);
            Ok(())
        }
        Commands::Repl => {
            let pipeline = runtime::build_pipeline(&settings)?;
            repl(&pipeline).await
        }
    }
}

fn print_preview(preview: Preview) {
    match preview {
        Preview::Ignored(reason) => println!("Ignored: {}", reason),
        Preview::Failed(err) => println!("Interpretation failed: {}", err),
        Preview::Interpreted {
            interpretation,
            commands,
            rejected,
        } => {
            println!(
                "{}",
                serde_json::to_string_pretty(&interpretation).unwrap_or_default()
            );
            for command in &commands {
                println!("would send: {}", command.describe());
            }
            for rejection in &rejected {
                println!(
                    "rejected: {} for squad {} ({})",
                    rejection.request.action, rejection.request.squad, rejection.reason
                );
            }
        }
    }
}

async fn repl(pipeline: &Pipeline) -> Result<(), AppError> {
    let prompt_err = |e: inquire::InquireError| AppError::Prompt(e.to_string());

    let sender = Text::new("Send as (roster name):")
        .prompt()
        .map_err(prompt_err)?;
    if pipeline.roster().lookup(&sender).is_none() {
        println!("`{}` is not on the roster; messages will be ignored.", sender);
    }
    let preview = Confirm::new("Ask the calendar for previews only?")
        .with_default(true)
        .prompt()
        .map_err(prompt_err)?;

    loop {
        let text = match Text::new("Message (empty to quit):").prompt() {
            Ok(text) => text,
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => break,
            Err(e) => return Err(prompt_err(e)),
        };
        if text.trim().is_empty() {
            break;
        }
        let result = pipeline.process(&local_message(&sender, &text, preview)).await;
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
    }
    Ok(())
}
