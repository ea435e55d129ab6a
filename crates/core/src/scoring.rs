//! Deterministic scoring of multiple-choice answers.
//!
//! Scoring is lenient: a question with no recorded answer, or with an answer
//! that is not exactly one of `a`, `b`, `c`, `d`, simply counts as incorrect.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{OptionKey, Question, QuestionId};

/// Selected option per question, as entered by the student.
///
/// Values are kept raw so malformed selections can be scored (as incorrect)
/// instead of rejected.
pub type Answers = HashMap<QuestionId, String>;

/// Points earned out of the number of questions asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub score: u32,
    pub total: u32,
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn selected_key(question: &Question, answers: &Answers) -> Option<OptionKey> {
    answers
        .get(&question.id())
        .and_then(|raw| OptionKey::parse(raw))
}

/// Count correct answers.
///
/// `total` is the number of questions; `score` counts questions whose recorded
/// answer equals the correct key exactly.
#[must_use]
pub fn score(questions: &[Question], answers: &Answers) -> Score {
    let correct = questions
        .iter()
        .filter(|q| selected_key(q, answers) == Some(q.correct_option()))
        .count();
    Score {
        score: count_u32(correct),
        total: count_u32(questions.len()),
    }
}

/// Outcome for one question after submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    /// `selected` is the raw value the student picked, which may not be a valid key.
    Incorrect { selected: String },
    Unanswered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerReview {
    pub question_id: QuestionId,
    pub correct_option: OptionKey,
    pub verdict: Verdict,
}

/// Per-question breakdown in question order, for showing the student what they got wrong.
#[must_use]
pub fn review(questions: &[Question], answers: &Answers) -> Vec<AnswerReview> {
    questions
        .iter()
        .map(|q| {
            let verdict = match answers.get(&q.id()) {
                None => Verdict::Unanswered,
                Some(raw) if OptionKey::parse(raw) == Some(q.correct_option()) => {
                    Verdict::Correct
                }
                Some(raw) => Verdict::Incorrect {
                    selected: raw.clone(),
                },
            };
            AnswerReview {
                question_id: q.id(),
                correct_option: q.correct_option(),
                verdict,
            }
        })
        .collect()
}
