//! Domain models shared between the session engine and every repository
//! implementation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use noesis_bkt::{KcParams, KcState};
use noesis_irt::ItemParams;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RepositoryError;

/// An authenticated learner. Attributes beyond the identifier belong to
/// the content/auth system, not the kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
}

/// A quiz: an ordered collection of [`Question`]s. Authoring metadata
/// lives outside the kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
}

/// One of the four labelled answer options, A through D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerLabel {
    A,
    B,
    C,
    D,
}

impl AnswerLabel {
    pub const ALL: [AnswerLabel; 4] = [
        AnswerLabel::A,
        AnswerLabel::B,
        AnswerLabel::C,
        AnswerLabel::D,
    ];
}

impl fmt::Display for AnswerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            AnswerLabel::A => 'A',
            AnswerLabel::B => 'B',
            AnswerLabel::C => 'C',
            AnswerLabel::D => 'D',
        };
        write!(f, "{c}")
    }
}

impl FromStr for AnswerLabel {
    type Err = RepositoryError;

    /// Case-insensitive parse, as required by the `selectedAnswer` field
    /// on the answer submission endpoint.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(AnswerLabel::A),
            "B" => Ok(AnswerLabel::B),
            "C" => Ok(AnswerLabel::C),
            "D" => Ok(AnswerLabel::D),
            other => Err(RepositoryError::InvalidArgument(format!(
                "selectedAnswer must be one of A, B, C, D (got {other})"
            ))),
        }
    }
}

/// One labelled answer option on a [`Question`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub label: AnswerLabel,
    pub text: String,
    pub is_correct: bool,
}

/// An immutable calibrated item. Never mutated by the kernel; authored
/// and versioned by the content system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub stem: String,
    /// Exactly four options, labelled A-D, exactly one `is_correct`.
    pub options: Vec<AnswerOption>,
    pub params: ItemParams,
    /// Cognitive complexity tier: 1 remember, 2 understand, 3 apply.
    pub bloom: u8,
    pub kc: String,
    /// Authored display order, used by the static control mode.
    pub order: u32,
}

impl Question {
    /// The label of the option marked `is_correct`, per the A,B,C,D
    /// authored order.
    pub fn correct_label(&self) -> Option<AnswerLabel> {
        self.options
            .iter()
            .find(|option| option.is_correct)
            .map(|option| option.label)
    }
}

/// BKT parameters for one knowledge component, indexed by `kc` id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcCatalogueEntry {
    pub kc_id: String,
    pub params: KcParams,
}

/// Assessment condition persisted on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Adaptive,
    Static,
}

impl FromStr for Condition {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adaptive" => Ok(Condition::Adaptive),
            "static" => Ok(Condition::Static),
            other => Err(RepositoryError::InvalidArgument(format!(
                "condition must be 'adaptive' or 'static' (got {other})"
            ))),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Adaptive => write!(f, "adaptive"),
            Condition::Static => write!(f, "static"),
        }
    }
}

/// Live per-learner session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub condition: Condition,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub theta: f64,
    pub theta_sd: f64,
    pub kc_states: HashMap<String, KcState>,
}

impl Session {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Fields required to create a new session, before an id or timestamps
/// are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub condition: Condition,
    pub theta: f64,
    pub theta_sd: f64,
    pub kc_states: HashMap<String, KcState>,
}

/// Immutable audit record of one answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub selected_answer: AnswerLabel,
    pub is_correct: bool,
    pub response_time_ms: u64,
    pub theta_before: f64,
    pub theta_after: f64,
    pub p_learned_before: f64,
    pub p_learned_after: f64,
    pub created_at: DateTime<Utc>,
}

/// Fields required to record an interaction, before an id or creation
/// timestamp are assigned by the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionDraft {
    pub question_id: Uuid,
    pub selected_answer: AnswerLabel,
    pub is_correct: bool,
    pub response_time_ms: u64,
    pub theta_before: f64,
    pub theta_after: f64,
    pub p_learned_before: f64,
    pub p_learned_after: f64,
}

/// The session-row fields overwritten atomically alongside an
/// [`InteractionDraft`] insert.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub theta: f64,
    pub theta_sd: f64,
    pub kc_states: HashMap<String, KcState>,
}
