use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::ProxyError;
use crate::models::ProxyRequest;
use crate::state::AppState;

pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("quiz response is not valid JSON: {0}")]
    NotJson(String),

    #[error("quiz response is not a JSON array")]
    NotAnArray,

    #[error("quiz response contains no questions")]
    Empty,

    #[error("question {index} is malformed: {reason}")]
    MalformedQuestion { index: usize, reason: String },
}

// body of a ```json ... ``` block, or the trimmed text itself
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // skip the info string ("json") on the opening line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// Models sometimes talk around the JSON; take the first `[` that starts an array of objects
fn array_in_prose(raw: &str) -> Option<Vec<Value>> {
    raw.match_indices('[').find_map(|(start, _)| {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Array(items))) if items.iter().any(Value::is_object) => Some(items),
            _ => None,
        }
    })
}

fn validate_question(index: usize, value: Value) -> Result<QuizQuestion, QuizError> {
    let malformed = |reason: &str| QuizError::MalformedQuestion {
        index,
        reason: reason.to_string(),
    };

    if !value.is_object() {
        return Err(malformed("not an object"));
    }
    match value.get("options") {
        Some(Value::Array(options)) if options.len() == OPTIONS_PER_QUESTION => {}
        Some(Value::Array(_)) => return Err(malformed("needs exactly 4 options")),
        _ => return Err(malformed("missing options")),
    }

    let question: QuizQuestion =
        serde_json::from_value(value).map_err(|e| malformed(&e.to_string()))?;
    if question.question.trim().is_empty() {
        return Err(malformed("empty question"));
    }
    if !question.options.contains(&question.correct_answer) {
        return Err(malformed("correctAnswer is not one of the options"));
    }
    Ok(question)
}

/// Parses and validates a provider quiz payload.
///
/// The whole payload is rejected if any element is malformed.
pub fn parse_questions(raw: &str) -> Result<Vec<QuizQuestion>, QuizError> {
    let items = match serde_json::from_str::<Value>(strip_code_fence(raw)) {
        Ok(Value::Array(items)) => items,
        Ok(_) => return Err(QuizError::NotAnArray),
        Err(e) => array_in_prose(raw).ok_or_else(|| QuizError::NotJson(e.to_string()))?,
    };
    if items.is_empty() {
        return Err(QuizError::Empty);
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_question(index, item))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Answering(usize),
    Answered(usize),
    Completed,
}

/// One-question-at-a-time quiz flow with scoring.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    current_index: usize,
    selected_option: Option<String>,
    is_answered: bool,
    score: usize,
    is_completed: bool,
}

impl QuizSession {
    pub fn new(questions: Vec<QuizQuestion>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }
        Ok(Self {
            questions,
            current_index: 0,
            selected_option: None,
            is_answered: false,
            score: 0,
            is_completed: false,
        })
    }

    pub fn phase(&self) -> Phase {
        if self.is_completed {
            Phase::Completed
        } else if self.is_answered {
            Phase::Answered(self.current_index)
        } else {
            Phase::Answering(self.current_index)
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        if self.is_completed {
            None
        } else {
            self.questions.get(self.current_index)
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn selected_option(&self) -> Option<&str> {
        self.selected_option.as_deref()
    }

    pub fn score(&self) -> usize {
        self.score
    }

    // Ignored once the question is answered, or for text that is not an option
    pub fn select_option(&mut self, option: &str) -> bool {
        let Phase::Answering(_) = self.phase() else {
            return false;
        };
        let Some(question) = self.current_question() else {
            return false;
        };
        if !question.options.iter().any(|o| o == option) {
            return false;
        }
        self.selected_option = Some(option.to_string());
        true
    }

    /// Locks in the selected option. Returns whether it was correct, or `None`
    /// when nothing is selected or the question was already checked.
    pub fn check_answer(&mut self) -> Option<bool> {
        let Phase::Answering(index) = self.phase() else {
            return None;
        };
        let selected = self.selected_option.as_deref()?;
        let correct = selected == self.questions[index].correct_answer;
        if correct {
            self.score += 1;
        }
        self.is_answered = true;
        Some(correct)
    }

    pub fn advance(&mut self) -> Phase {
        if let Phase::Answered(index) = self.phase() {
            if index + 1 < self.questions.len() {
                self.current_index = index + 1;
                self.selected_option = None;
                self.is_answered = false;
            } else {
                self.is_completed = true;
            }
        }
        self.phase()
    }

    pub fn restart(&mut self) {
        self.current_index = 0;
        self.selected_option = None;
        self.is_answered = false;
        self.score = 0;
        self.is_completed = false;
    }

    // round(score / len * 100), only once the quiz is done
    pub fn percentage(&self) -> Option<u32> {
        if !self.is_completed {
            return None;
        }
        let ratio = self.score as f64 / self.questions.len() as f64;
        Some((ratio * 100.0).round() as u32)
    }
}

/// Anything that can produce a raw quiz payload for some study material.
#[async_trait]
pub trait QuizSource: Send + Sync {
    async fn generate_quiz(&self, content: &str) -> Result<String, ProxyError>;
}

#[async_trait]
impl QuizSource for AppState {
    async fn generate_quiz(&self, content: &str) -> Result<String, ProxyError> {
        self.complete(ProxyRequest {
            task: "quiz".to_string(),
            prompt: None,
            content: content.to_string(),
        })
        .await
    }
}

#[derive(Debug, Clone)]
pub enum QuizView {
    Loading,
    Error(String),
    Ready(QuizSession),
}

impl QuizView {
    /// Fetches a new question set and replaces the current view with it.
    /// Errors of every kind end up as `Error` with a message to show.
    pub async fn regenerate<S: QuizSource + ?Sized>(&mut self, source: &S, content: &str) {
        *self = QuizView::Loading;
        *self = match source.generate_quiz(content).await {
            Ok(raw) => Self::from_payload(&raw),
            Err(e) => {
                tracing::warn!(error = %e, "quiz generation failed");
                QuizView::Error(e.to_string())
            }
        };
    }

    pub fn from_payload(raw: &str) -> Self {
        match parse_questions(raw).and_then(QuizSession::new) {
            Ok(session) => QuizView::Ready(session),
            Err(e) => {
                tracing::warn!(error = %e, "rejected quiz payload");
                QuizView::Error(e.to_string())
            }
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut QuizSession> {
        match self {
            QuizView::Ready(session) => Some(session),
            _ => None,
        }
    }
}
