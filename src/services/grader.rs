// src/services/grader.rs

use crate::{
    config::DEFAULT_MAX_SCORE,
    models::{activity::Question, attempt::QuizResponse},
};

/// Outcome of grading one quiz submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizGrade {
    pub correct_count: usize,
    pub total_questions: usize,
    pub score: f64,
}

/// Grades `responses` against `questions` on a `0..=max_score` scale.
///
/// Questions without a response, or answered with the wrong alternative,
/// count as incorrect. Responses to unknown questions are ignored and only the
/// first response per question is considered. Never fails.
pub fn grade(questions: &[Question], responses: &[QuizResponse], max_score: f64) -> QuizGrade {
    let total_questions = questions.len();

    if total_questions == 0 {
        return QuizGrade {
            correct_count: 0,
            total_questions: 0,
            score: 0.0,
        };
    }

    let correct_count = questions
        .iter()
        .filter(|question| {
            let chosen = responses
                .iter()
                .find(|r| r.question_id == question.id)
                .map(|r| r.alternative_id);
            matches!(
                (chosen, question.correct_alternative()),
                (Some(chosen), Some(correct)) if chosen == correct
            )
        })
        .count();

    let score = (correct_count as f64 / total_questions as f64) * max_score;

    QuizGrade {
        correct_count,
        total_questions,
        score,
    }
}

/// Score on the default ten-point scale.
pub fn score(questions: &[Question], responses: &[QuizResponse]) -> f64 {
    grade(questions, responses, DEFAULT_MAX_SCORE).score
}
