//! CLI command definitions for the `formflow` binary.
//!
//! Follows a noun-verb pattern (e.g. `formflow workflow show <form>`,
//! `formflow question add <form> ...`).

pub mod question;
pub mod workflow;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

/// Edit and publish form workflow graphs.
#[derive(Parser)]
#[command(name = "formflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Identity recorded as the last editor of changed versions.
    #[arg(long, global = true, env = "FORMFLOW_EDITOR")]
    pub editor: Option<Uuid>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Editor id for this invocation; the nil UUID stands for the local user.
    pub fn editor_id(&self) -> Uuid {
        self.editor.unwrap_or(Uuid::nil())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect, edit, validate and activate a form's workflow.
    #[command(alias = "wf")]
    Workflow {
        #[command(subcommand)]
        action: workflow::WorkflowCommand,
    },

    /// Register and list the questions condition rules can test.
    #[command(alias = "q")]
    Question {
        #[command(subcommand)]
        action: question::QuestionCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
