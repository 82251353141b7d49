//! UK-Geography seed data shared by engine and server tests: a
//! five-question bank, one knowledge component, and a known user/quiz
//! pair, pre-loaded into an [`InMemoryRepository`].

use std::collections::HashMap;

use noesis_bkt::KcParams;
use noesis_irt::ItemParams;
use uuid::Uuid;

use crate::in_memory::InMemoryRepository;
use crate::models::{AnswerLabel, AnswerOption, KcCatalogueEntry, Question, Quiz, User};

/// BKT parameters for the single seeded knowledge component.
pub const UK_CAPITALS: KcParams = KcParams {
    p_l0: 0.60,
    p_t: 0.25,
    p_s: 0.08,
    p_g: 0.25,
};

pub const KC_UK_CAPITALS: &str = "UK_capitals";

/// A fully seeded fixture set, with stable ids so tests can assert on
/// specific questions (e.g. `q-002`, the adaptive engine's first pick).
#[derive(Debug, Clone)]
pub struct Fixture {
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    /// `"q-001"..="q-005"`, in authored order, mapped to their ids.
    pub question_ids: HashMap<&'static str, Uuid>,
}

impl Fixture {
    pub fn question_id(&self, slug: &str) -> Uuid {
        *self
            .question_ids
            .get(slug)
            .unwrap_or_else(|| panic!("unknown fixture question slug {slug}"))
    }
}

fn question(
    quiz_id: Uuid,
    slug: &str,
    stem: &str,
    correct_text: &str,
    distractors: [&str; 3],
    a: f64,
    b: f64,
    c: f64,
    bloom: u8,
    order: u32,
) -> (Uuid, Question) {
    let _ = slug;
    let id = Uuid::new_v4();
    let options = vec![
        AnswerOption {
            label: AnswerLabel::A,
            text: correct_text.to_string(),
            is_correct: true,
        },
        AnswerOption {
            label: AnswerLabel::B,
            text: distractors[0].to_string(),
            is_correct: false,
        },
        AnswerOption {
            label: AnswerLabel::C,
            text: distractors[1].to_string(),
            is_correct: false,
        },
        AnswerOption {
            label: AnswerLabel::D,
            text: distractors[2].to_string(),
            is_correct: false,
        },
    ];
    let item = Question {
        id,
        quiz_id,
        stem: stem.to_string(),
        options,
        params: ItemParams::new(a, b, c),
        bloom,
        kc: KC_UK_CAPITALS.to_string(),
        order,
    };
    (id, item)
}

/// Builds the five-question UK-Geography bank against a given quiz id.
///
/// `b` values follow the seeded bank: `q-001=-0.80`, `q-002=-1.50`,
/// `q-003=-0.60`, `q-004=0.20`, `q-005=0.50`, all `a=1.20`, `c=0.25`.
fn bank(quiz_id: Uuid) -> Vec<(Uuid, Question)> {
    vec![
        question(
            quiz_id,
            "q-001",
            "What is the capital of England?",
            "London",
            ["Manchester", "Birmingham", "Leeds"],
            1.20,
            -0.80,
            0.25,
            1,
            1,
        ),
        question(
            quiz_id,
            "q-002",
            "What is the capital of Scotland?",
            "Edinburgh",
            ["Glasgow", "Aberdeen", "Dundee"],
            1.20,
            -1.50,
            0.25,
            1,
            2,
        ),
        question(
            quiz_id,
            "q-003",
            "What is the capital of Wales?",
            "Cardiff",
            ["Swansea", "Newport", "Wrexham"],
            1.20,
            -0.60,
            0.25,
            2,
            3,
        ),
        question(
            quiz_id,
            "q-004",
            "What is the capital of Northern Ireland?",
            "Belfast",
            ["Derry", "Lisburn", "Newry"],
            1.20,
            0.20,
            0.25,
            2,
            4,
        ),
        question(
            quiz_id,
            "q-005",
            "Which strait separates Great Britain from Ireland?",
            "North Channel",
            ["English Channel", "Strait of Dover", "Solent"],
            1.20,
            0.50,
            0.25,
            3,
            5,
        ),
    ]
}

/// Seeds a fresh [`InMemoryRepository`] with the UK-Geography bank, a
/// single user, and the `UK_capitals` KC catalogue entry.
pub async fn seeded_repository() -> (InMemoryRepository, Fixture) {
    let repo = InMemoryRepository::new();

    let user_id = Uuid::new_v4();
    let quiz_id = Uuid::new_v4();

    repo.seed_user(User { id: user_id }).await;
    repo.seed_quiz(Quiz { id: quiz_id }).await;

    let mut question_ids = HashMap::new();
    for (id, question) in bank(quiz_id) {
        let slug: &'static str = match question.order {
            1 => "q-001",
            2 => "q-002",
            3 => "q-003",
            4 => "q-004",
            _ => "q-005",
        };
        question_ids.insert(slug, id);
        repo.seed_question(question).await;
    }

    repo.seed_kc_catalogue(vec![KcCatalogueEntry {
        kc_id: KC_UK_CAPITALS.to_string(),
        params: UK_CAPITALS,
    }])
    .await;

    (
        repo,
        Fixture {
            user_id,
            quiz_id,
            question_ids,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Repository;

    #[tokio::test]
    async fn seeded_bank_has_five_questions_in_order() {
        let (repo, fixture) = seeded_repository().await;
        let questions = repo
            .list_questions_for_quiz(fixture.quiz_id)
            .await
            .unwrap();
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[0].id, fixture.question_id("q-001"));
        assert_eq!(questions[1].id, fixture.question_id("q-002"));
        assert!(questions.iter().all(|q| q.kc == KC_UK_CAPITALS));
    }

    #[tokio::test]
    async fn seeded_catalogue_has_uk_capitals() {
        let (repo, _fixture) = seeded_repository().await;
        let catalogue = repo.get_kc_catalogue().await.unwrap();
        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue[0].kc_id, KC_UK_CAPITALS);
        assert_eq!(catalogue[0].params.p_l0, 0.60);
    }
}
