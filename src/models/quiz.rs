//! Quiz payload stored as JSON in the blob store.
//!
//! Only the parts the service reads are typed strictly. Everything else is
//! optional so older bundles still parse.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct QuizData {
    #[serde(default)]
    pub metadata: QuizMetadata,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct QuizMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub category: Vec<String>,
    pub difficulty: String,
    pub version: String,
    pub created_at: String,
    pub updated_at: String,
    pub author: String,
    pub source: String,
    pub tags: Vec<String>,
    pub license: String,
    pub num_questions: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Question {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub question: QuestionContent,
    pub choices: Vec<Choice>,
    pub answer: AnswerContent,
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestionContent {
    pub question_text: String,
    pub question_explanation: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AnswerContent {
    pub answer_text: String,
    pub answer_explanation: String,
}

/// A single answer choice. Accepts the legacy bare-string form on input.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", from = "ChoiceRepr")]
pub struct Choice {
    pub choice: String,
    pub choice_explanation: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChoiceRepr {
    Legacy(String),
    #[serde(rename_all = "camelCase")]
    Full {
        choice: String,
        #[serde(default)]
        choice_explanation: String,
    },
}

impl From<ChoiceRepr> for Choice {
    fn from(repr: ChoiceRepr) -> Self {
        match repr {
            ChoiceRepr::Legacy(choice) => Choice {
                choice,
                choice_explanation: String::new(),
            },
            ChoiceRepr::Full {
                choice,
                choice_explanation,
            } => Choice {
                choice,
                choice_explanation,
            },
        }
    }
}

impl QuizData {
    /// Declared question count, falling back to the number of questions present.
    pub fn questions_count(&self) -> i64 {
        self.metadata
            .num_questions
            .unwrap_or(self.questions.len() as i64)
    }
}
