//! CLI question subcommands.
//!
//! Registers the questions that condition rules reference. Answer handling
//! lives elsewhere; only id, placement, kind and choice ids are kept.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use formflow_core::repository::question::QuestionResolver;
use formflow_types::form::FormId;
use formflow_types::question::{AnswerableRef, QuestionKind};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum QuestionCommand {
    /// Register a question on a form.
    Add {
        /// Form UUID.
        form: String,

        /// Answer type (e.g. short_text, single_choice, dropdown).
        #[arg(long)]
        kind: QuestionKind,

        /// Section node the question is placed in.
        #[arg(long)]
        section: Option<String>,

        /// Choice id; repeat for each choice.
        #[arg(long)]
        choice: Vec<String>,

        /// Use this question id instead of a generated one.
        #[arg(long)]
        id: Option<Uuid>,
    },

    /// List the questions of a form.
    #[command(alias = "ls")]
    List {
        /// Form UUID.
        form: String,
    },
}

pub async fn handle_question_command(cmd: QuestionCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        QuestionCommand::Add {
            form,
            kind,
            section,
            choice,
            id,
        } => {
            let question = AnswerableRef {
                id: id.unwrap_or_else(Uuid::now_v7),
                form_id: parse_form(&form)?,
                section_id: section,
                kind,
                choice_ids: choice,
            };
            state
                .question_repo
                .create(&question)
                .await
                .context("Failed to store question")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&question)?);
            } else {
                println!();
                println!(
                    "  {} Added {} question {}",
                    style("*").green().bold(),
                    question.kind,
                    style(question.id).cyan()
                );
                if !question.is_choice() && !question.choice_ids.is_empty() {
                    println!(
                        "  {}",
                        style("Note: choice ids are ignored for free-form questions").dim()
                    );
                }
                println!();
            }
            Ok(())
        }
        QuestionCommand::List { form } => {
            let form_id = parse_form(&form)?;
            let questions = state.question_repo.list_by_form_id(&form_id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&questions)?);
                return Ok(());
            }

            if questions.is_empty() {
                println!();
                println!("  No questions registered for form {form_id}.");
                println!();
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(presets::UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    Cell::new("Id").fg(Color::Cyan),
                    Cell::new("Kind"),
                    Cell::new("Section"),
                    Cell::new("Choices"),
                ]);
            for q in &questions {
                table.add_row(vec![
                    Cell::new(q.id),
                    Cell::new(q.kind),
                    Cell::new(q.section_id.as_deref().unwrap_or("-")),
                    Cell::new(q.choice_ids.join(", ")),
                ]);
            }
            println!();
            println!("{table}");
            println!();
            Ok(())
        }
    }
}

fn parse_form(raw: &str) -> Result<FormId> {
    raw.parse::<FormId>()
        .with_context(|| format!("'{raw}' is not a valid form UUID"))
}
