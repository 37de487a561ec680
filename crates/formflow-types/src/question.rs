//! Question references as seen by the workflow engine.
//!
//! The question subsystem owns answer types and value validation. Workflow
//! validation only needs to know whether a question exists, where it lives,
//! and whether it is choice-bearing or free-form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::form::FormId;

/// Answer type of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    ShortText,
    LongText,
    SingleChoice,
    MultipleChoice,
    Dropdown,
    Ranking,
    Date,
    LinearScale,
    Rating,
    UploadFile,
    Hyperlink,
}

impl QuestionKind {
    pub fn capability(&self) -> QuestionCapability {
        match self {
            QuestionKind::SingleChoice
            | QuestionKind::MultipleChoice
            | QuestionKind::Dropdown
            | QuestionKind::Ranking => QuestionCapability::Choice,
            QuestionKind::ShortText
            | QuestionKind::LongText
            | QuestionKind::Date
            | QuestionKind::LinearScale
            | QuestionKind::Rating
            | QuestionKind::UploadFile
            | QuestionKind::Hyperlink => QuestionCapability::FreeForm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::ShortText => "short_text",
            QuestionKind::LongText => "long_text",
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::Dropdown => "dropdown",
            QuestionKind::Ranking => "ranking",
            QuestionKind::Date => "date",
            QuestionKind::LinearScale => "linear_scale",
            QuestionKind::Rating => "rating",
            QuestionKind::UploadFile => "upload_file",
            QuestionKind::Hyperlink => "hyperlink",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_text" => Ok(QuestionKind::ShortText),
            "long_text" => Ok(QuestionKind::LongText),
            "single_choice" => Ok(QuestionKind::SingleChoice),
            "multiple_choice" => Ok(QuestionKind::MultipleChoice),
            "dropdown" => Ok(QuestionKind::Dropdown),
            "ranking" => Ok(QuestionKind::Ranking),
            "date" => Ok(QuestionKind::Date),
            "linear_scale" => Ok(QuestionKind::LinearScale),
            "rating" => Ok(QuestionKind::Rating),
            "upload_file" => Ok(QuestionKind::UploadFile),
            "hyperlink" => Ok(QuestionKind::Hyperlink),
            other => Err(format!("unknown question kind: '{other}'")),
        }
    }
}

/// Capability class of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCapability {
    /// Answers are drawn from a fixed set of choice identities.
    Choice,
    FreeForm,
}

/// Narrow view of a question, enough to validate a condition rule against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerableRef {
    pub id: Uuid,
    pub form_id: FormId,
    /// Section (workflow node) the question is placed in, if placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    pub kind: QuestionKind,
    /// Choice identities, for choice-bearing questions.
    #[serde(default)]
    pub choice_ids: Vec<String>,
}

impl AnswerableRef {
    pub fn capability(&self) -> QuestionCapability {
        self.kind.capability()
    }

    pub fn is_choice(&self) -> bool {
        self.capability() == QuestionCapability::Choice
    }
}
