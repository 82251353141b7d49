//! Session engine: one method per external event (`create_session`,
//! `select_next`, `submit_answer`), enforcing the session state machine
//! and the transactional per-response update on top of [`Repository`].

mod error;

pub use error::EngineError;

use std::sync::Arc;

use chrono::Utc;
use noesis_bkt::{update_kc_state, KcParams, KcState};
use noesis_irt::{eap_estimate, item_information, ScoredResponse};
use noesis_repository::{
    AnswerLabel, Condition as RepoCondition, InteractionDraft, NewSession, Repository,
    SessionUpdate,
};
use noesis_selector::{
    select_next_question, Condition as SelectorCondition, SelectableItem, SelectionCriteria,
};
use serde::Serialize;
use uuid::Uuid;

/// Session completion policy: whether a session ends on item exhaustion
/// (the default) or as soon as every catalogued KC reaches mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionCompletionMode {
    #[default]
    ItemExhaustion,
    AllKcsMastered,
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn repo_condition_to_selector(condition: RepoCondition) -> SelectorCondition {
    match condition {
        RepoCondition::Adaptive => SelectorCondition::Adaptive,
        RepoCondition::Static => SelectorCondition::Static,
    }
}

/// Response to a successful `createSession` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub condition: RepoCondition,
    pub theta: f64,
    pub theta_sd: f64,
    pub message: String,
}

/// The meta envelope accompanying a served question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextQuestionMeta {
    pub current_theta: f64,
    pub item_difficulty: f64,
    pub item_information: f64,
    pub questions_answered: usize,
    pub questions_remaining: usize,
    pub condition: RepoCondition,
}

/// A question stripped of correctness metadata, ready to serve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextQuestion {
    pub question_id: Uuid,
    pub text: String,
    pub options: Vec<(AnswerLabel, String)>,
    pub bloom: u8,
    pub kc: String,
    pub meta: NextQuestionMeta,
}

/// Returned once every quiz question has an interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionComplete {
    pub completed: bool,
    pub final_theta: f64,
    pub total_answered: usize,
}

/// Either a question to serve, or the session-complete payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NextStep {
    Question(NextQuestion),
    Complete(SessionComplete),
}

/// Ability-estimate summary returned from `submitAnswer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThetaSummary {
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    pub sd: f64,
    pub ci95: [f64; 2],
}

/// BKT update summary for the one KC touched by the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BktSummary {
    pub kc: String,
    pub p_learned_before: f64,
    pub p_learned_after: f64,
    pub is_mastered: bool,
}

/// Response to a successful `submitAnswer` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRecorded {
    pub correct: bool,
    pub correct_answer: AnswerLabel,
    pub selected_answer: AnswerLabel,
    pub theta: ThetaSummary,
    pub bkt: BktSummary,
    pub interaction_id: Uuid,
}

/// Default KC `pLearned` used when a question's `kc` is not in the
/// catalogue at all: a degenerate authoring condition, not the normal
/// "not yet attempted" case (which uses the catalogue's `pL0`).
const UNCATALOGUED_KC_DEFAULT: f64 = 0.25;

pub struct SessionEngine {
    repo: Arc<dyn Repository>,
    completion_mode: SessionCompletionMode,
}

impl SessionEngine {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            completion_mode: SessionCompletionMode::default(),
        }
    }

    pub fn with_completion_mode(repo: Arc<dyn Repository>, mode: SessionCompletionMode) -> Self {
        Self {
            repo,
            completion_mode: mode,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_session(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        condition: &str,
    ) -> Result<SessionCreated, EngineError> {
        let condition: RepoCondition = condition
            .parse()
            .map_err(|_| EngineError::InvalidArgument(format!("unknown condition {condition}")))?;

        if self.repo.get_user(user_id).await?.is_none() {
            return Err(EngineError::NotFound(format!("user {user_id}")));
        }
        if self.repo.get_quiz(quiz_id).await?.is_none() {
            return Err(EngineError::NotFound(format!("quiz {quiz_id}")));
        }

        let catalogue = self.repo.get_kc_catalogue().await?;
        let entries: Vec<(String, KcParams)> = catalogue
            .into_iter()
            .map(|entry| (entry.kc_id, entry.params))
            .collect();
        let kc_states = noesis_bkt::initialise_all_kcs(&entries);

        let session = self
            .repo
            .create_session(NewSession {
                user_id,
                quiz_id,
                condition,
                theta: noesis_irt::DEFAULT_THETA0,
                theta_sd: noesis_irt::DEFAULT_SIGMA0,
                kc_states,
            })
            .await?;

        tracing::info!(session_id = %session.id, "session created");

        Ok(SessionCreated {
            session_id: session.id,
            condition: session.condition,
            theta: session.theta,
            theta_sd: session.theta_sd,
            message: "session created".to_string(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn select_next(&self, session_id: Uuid) -> Result<NextStep, EngineError> {
        let (session, interactions) = self
            .repo
            .get_session(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {session_id}")))?;
        if session.is_completed() {
            return Err(EngineError::Conflict(format!(
                "session {session_id} is already completed"
            )));
        }

        let questions = self.repo.list_questions_for_quiz(session.quiz_id).await?;
        let answered: std::collections::HashSet<Uuid> =
            interactions.iter().map(|i| i.question_id).collect();

        let all_answered = questions.iter().all(|q| answered.contains(&q.id));
        let mastery_complete = matches!(self.completion_mode, SessionCompletionMode::AllKcsMastered)
            && !session.kc_states.is_empty()
            && session.kc_states.values().all(|s| s.is_mastered);

        if all_answered || mastery_complete {
            let completed = self.repo.complete_session(session_id, Utc::now()).await?;
            tracing::info!(session_id = %session_id, total = interactions.len(), "session completed");
            return Ok(NextStep::Complete(SessionComplete {
                completed: true,
                final_theta: round3(completed.theta),
                total_answered: interactions.len(),
            }));
        }

        let bank: Vec<SelectableItem> = questions
            .iter()
            .map(|q| SelectableItem {
                id: q.id.to_string(),
                params: q.params,
                bloom: q.bloom,
                order: q.order,
            })
            .collect();
        let exclude_ids = answered.iter().map(|id| id.to_string()).collect();
        let criteria = SelectionCriteria {
            target_theta: session.theta,
            exclude_ids,
            bloom_level: None,
        };
        let selector_condition = repo_condition_to_selector(session.condition);

        let picked = select_next_question(&bank, &criteria, selector_condition)
            .ok_or_else(|| EngineError::NotFound("no eligible question remains".to_string()))?;
        let question_id: Uuid = picked
            .id
            .parse()
            .map_err(|_| EngineError::Internal("malformed question id in bank".to_string()))?;
        let question = questions
            .into_iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| EngineError::Internal("selected question vanished".to_string()))?;

        let info = item_information(session.theta, question.params).unwrap_or(0.0);

        Ok(NextStep::Question(NextQuestion {
            question_id: question.id,
            text: question.stem.clone(),
            options: question
                .options
                .iter()
                .map(|o| (o.label, o.text.clone()))
                .collect(),
            bloom: question.bloom,
            kc: question.kc.clone(),
            meta: NextQuestionMeta {
                current_theta: round3(session.theta),
                item_difficulty: question.params.b,
                item_information: round3(info),
                questions_answered: answered.len(),
                questions_remaining: bank.len() - answered.len() - 1,
                condition: session.condition,
            },
        }))
    }

    #[tracing::instrument(skip(self, selected_answer))]
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        question_id: Uuid,
        selected_answer: &str,
        response_time_ms: u64,
    ) -> Result<AnswerRecorded, EngineError> {
        let (session, interactions) = self
            .repo
            .get_session(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {session_id}")))?;
        if session.is_completed() {
            return Err(EngineError::Conflict(format!(
                "session {session_id} is already completed"
            )));
        }

        let question = self
            .repo
            .get_question(question_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("question {question_id}")))?;
        if question.quiz_id != session.quiz_id {
            return Err(EngineError::InvalidArgument(
                "question does not belong to this session's quiz".to_string(),
            ));
        }
        if interactions.iter().any(|i| i.question_id == question_id) {
            return Err(EngineError::Conflict(format!(
                "question {question_id} already answered in this session"
            )));
        }

        let normalised: AnswerLabel = selected_answer
            .parse()
            .map_err(|_| EngineError::InvalidArgument(format!(
                "selectedAnswer must be one of A, B, C, D (got {selected_answer})"
            )))?;
        let correct_label = question
            .correct_label()
            .ok_or_else(|| EngineError::Internal("question has no correct option".to_string()))?;
        let is_correct = normalised == correct_label;

        let mut responses: Vec<ScoredResponse> = Vec::with_capacity(interactions.len() + 1);
        for prior in &interactions {
            let prior_question = self
                .repo
                .get_question(prior.question_id)
                .await?
                .ok_or_else(|| {
                    EngineError::Internal(format!(
                        "question {} referenced by prior interaction is missing",
                        prior.question_id
                    ))
                })?;
            responses.push(ScoredResponse {
                params: prior_question.params,
                correct: prior.is_correct,
            });
        }
        responses.push(ScoredResponse {
            params: question.params,
            correct: is_correct,
        });

        let eap = eap_estimate(&responses, noesis_irt::DEFAULT_THETA0, noesis_irt::DEFAULT_SIGMA0);
        let theta_before = session.theta;

        let catalogue = self.repo.get_kc_catalogue().await?;
        let kc_params = catalogue.iter().find(|e| e.kc_id == question.kc).map(|e| e.params);

        let mut kc_states = session.kc_states.clone();
        let (p_learned_before, p_learned_after, is_mastered) = match kc_params {
            Some(params) => {
                let existing = kc_states
                    .get(&question.kc)
                    .cloned()
                    .unwrap_or_else(|| KcState::initial(question.kc.clone(), params));
                let p_before = existing.p_learned;
                let updated = update_kc_state(&existing, is_correct, params)?;
                let p_after = updated.p_learned;
                let mastered = updated.is_mastered;
                kc_states.insert(question.kc.clone(), updated);
                (p_before, p_after, mastered)
            }
            None => (
                UNCATALOGUED_KC_DEFAULT,
                UNCATALOGUED_KC_DEFAULT,
                false,
            ),
        };

        let draft = InteractionDraft {
            question_id,
            selected_answer: normalised,
            is_correct,
            response_time_ms,
            theta_before,
            theta_after: eap.theta,
            p_learned_before,
            p_learned_after,
        };
        let session_update = SessionUpdate {
            theta: eap.theta,
            theta_sd: eap.sd,
            kc_states,
        };

        let interaction = self
            .repo
            .record_answer_atomically(session_id, draft, session_update)
            .await?;

        tracing::info!(
            session_id = %session_id,
            question_id = %question_id,
            is_correct,
            "answer recorded"
        );

        Ok(AnswerRecorded {
            correct: is_correct,
            correct_answer: correct_label,
            selected_answer: normalised,
            theta: ThetaSummary {
                before: round3(theta_before),
                after: round3(eap.theta),
                delta: round3(eap.theta - theta_before),
                sd: round3(eap.sd),
                ci95: [round3(eap.ci95_low), round3(eap.ci95_high)],
            },
            bkt: BktSummary {
                kc: question.kc.clone(),
                p_learned_before: round3(p_learned_before),
                p_learned_after: round3(p_learned_after),
                is_mastered,
            },
            interaction_id: interaction.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_repository::fixtures::seeded_repository;
    use noesis_repository::InMemoryRepository;

    async fn engine() -> (SessionEngine, noesis_repository::fixtures::Fixture) {
        let (repo, fixture) = seeded_repository().await;
        (SessionEngine::new(Arc::new(repo)), fixture)
    }

    #[tokio::test]
    async fn create_session_bootstraps_prior_theta() {
        let (engine, fixture) = engine().await;
        let created = engine
            .create_session(fixture.user_id, fixture.quiz_id, "adaptive")
            .await
            .unwrap();
        assert_eq!(created.theta, -0.780);
        assert_eq!(created.theta_sd, 0.543);
        assert_eq!(created.condition, RepoCondition::Adaptive);
    }

    #[tokio::test]
    async fn create_session_rejects_unknown_user() {
        let (_repo, fixture) = seeded_repository().await;
        let repo = InMemoryRepository::new();
        let engine = SessionEngine::new(Arc::new(repo));
        let result = engine
            .create_session(fixture.user_id, fixture.quiz_id, "adaptive")
            .await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn adaptive_first_pick_maximises_information() {
        let (engine, fixture) = engine().await;
        let created = engine
            .create_session(fixture.user_id, fixture.quiz_id, "adaptive")
            .await
            .unwrap();
        let next = engine.select_next(created.session_id).await.unwrap();
        match next {
            NextStep::Question(q) => assert_eq!(q.question_id, fixture.question_id("q-002")),
            NextStep::Complete(_) => panic!("expected a question"),
        }
    }

    #[tokio::test]
    async fn correct_answer_increases_theta() {
        let (engine, fixture) = engine().await;
        let created = engine
            .create_session(fixture.user_id, fixture.quiz_id, "adaptive")
            .await
            .unwrap();
        let q002 = fixture.question_id("q-002");
        let result = engine
            .submit_answer(created.session_id, q002, "A", 1500)
            .await
            .unwrap();
        assert!(result.correct);
        assert!(result.theta.after > result.theta.before);
        assert!(result.theta.delta > 0.0);
        assert!(result.theta.ci95[0] <= result.theta.after);
        assert!(result.theta.after <= result.theta.ci95[1]);
    }

    #[tokio::test]
    async fn submit_answer_updates_bkt_p_learned() {
        let (engine, fixture) = engine().await;
        let created = engine
            .create_session(fixture.user_id, fixture.quiz_id, "adaptive")
            .await
            .unwrap();
        let q002 = fixture.question_id("q-002");
        let result = engine
            .submit_answer(created.session_id, q002, "A", 1500)
            .await
            .unwrap();
        assert!((result.bkt.p_learned_after - 0.885).abs() < 1e-3);
    }

    #[tokio::test]
    async fn duplicate_answer_to_same_question_is_conflict() {
        let (engine, fixture) = engine().await;
        let created = engine
            .create_session(fixture.user_id, fixture.quiz_id, "adaptive")
            .await
            .unwrap();
        let q002 = fixture.question_id("q-002");
        engine
            .submit_answer(created.session_id, q002, "A", 1500)
            .await
            .unwrap();
        let result = engine
            .submit_answer(created.session_id, q002, "B", 1500)
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
    }

    #[tokio::test]
    async fn session_completes_after_all_items_answered() {
        let (engine, fixture) = engine().await;
        let created = engine
            .create_session(fixture.user_id, fixture.quiz_id, "adaptive")
            .await
            .unwrap();

        for slug in ["q-001", "q-002", "q-003", "q-004", "q-005"] {
            let id = fixture.question_id(slug);
            engine
                .submit_answer(created.session_id, id, "A", 1000)
                .await
                .unwrap();
        }

        let next = engine.select_next(created.session_id).await.unwrap();
        match next {
            NextStep::Complete(complete) => {
                assert!(complete.completed);
                assert_eq!(complete.total_answered, 5);
            }
            NextStep::Question(_) => panic!("expected completion"),
        }

        let result = engine
            .submit_answer(created.session_id, fixture.question_id("q-001"), "A", 1000)
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
    }

    #[tokio::test]
    async fn static_condition_uses_authored_order() {
        let (engine, fixture) = engine().await;
        let created = engine
            .create_session(fixture.user_id, fixture.quiz_id, "static")
            .await
            .unwrap();
        let next = engine.select_next(created.session_id).await.unwrap();
        match next {
            NextStep::Question(q) => assert_eq!(q.question_id, fixture.question_id("q-001")),
            NextStep::Complete(_) => panic!("expected a question"),
        }
    }
}
