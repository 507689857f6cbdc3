//! Read-only quiz content, as fetched from the document store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The four question variants this engine knows how to grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionKind {
    SingleMcq,
    TrueFalse,
    MultiMcq,
    DragAndDrop,
}

/// A single question. Fields beyond `question`/`kind`/`options` are optional
/// because which ones are populated depends on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "questionText")]
    pub question: String,

    #[serde(rename = "type")]
    pub kind: QuestionKind,

    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub id: Option<String>,

    /// Per-question override. The session's `per_question_time_limit` wins
    /// at runtime regardless of this value; it is retained on the model only
    /// because it round-trips through the document store.
    #[serde(rename = "timeLimit", default)]
    pub time_limit: Option<u32>,

    #[serde(rename = "correctAnswerIndex", default)]
    pub correct_answer_index: Option<usize>,

    #[serde(rename = "correctAnswerIndices", default)]
    pub correct_answer_indices: Option<Vec<usize>>,

    #[serde(rename = "dragItems", default)]
    pub drag_items: Option<Vec<String>>,

    #[serde(rename = "dropTargets", default)]
    pub drop_targets: Option<Vec<String>>,

    #[serde(rename = "correctMatches", default)]
    pub correct_matches: Option<BTreeMap<String, String>>,

    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}

/// A quiz document as stored in the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
}
