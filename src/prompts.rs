use std::fmt;
use std::str::FromStr;

use crate::error::ProxyError;

// Study tasks the browser can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Summarize,
    Quiz,
    AskDoubt,
    MindMap,
    Flashcards,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Summarize => "summarize",
            Task::Quiz => "quiz",
            Task::AskDoubt => "askdoubt",
            Task::MindMap => "mindmap",
            Task::Flashcards => "flashcards",
        }
    }
}

impl FromStr for Task {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize" => Ok(Task::Summarize),
            "quiz" => Ok(Task::Quiz),
            "askdoubt" => Ok(Task::AskDoubt),
            "mindmap" => Ok(Task::MindMap),
            "flashcards" => Ok(Task::Flashcards),
            other => Err(ProxyError::InvalidTask(other.to_string())),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Default,
    Reasoning,
}

// Concrete model names for each tier
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub default_model: String,
    pub reasoning_model: String,
}

impl ModelConfig {
    pub fn resolve(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Default => &self.default_model,
            ModelTier::Reasoning => &self.reasoning_model,
        }
    }
}

/// Everything the upstream caller needs for one chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPrompt {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

const SUMMARIZE_SYSTEM: &str = "You are an expert study assistant. Summarize the material a student \
gives you into clear, accurate key points. Stay factual and do not add information that is not in \
the material.";

const QUIZ_SYSTEM: &str = r#"You are a quiz generator for students. Respond ONLY with a JSON array of exactly 5 objects and no other text. Each object must have the shape {"question": string, "options": [string, string, string, string], "correctAnswer": string}. "options" must contain exactly 4 distinct answers and "correctAnswer" must repeat one of them verbatim."#;

const ASKDOUBT_SYSTEM: &str = "You are a patient tutor. Answer the student's question using the \
study material as context. Explain step by step in simple language, and say so when the material \
does not cover the question.";

const MINDMAP_SYSTEM: &str = r#"You build 3D mind maps of study material. Respond ONLY with a JSON object and no other text, shaped as {"center": string, "nodes": [{"id": string, "text": string, "position": {"x": number, "y": number, "z": number}, "children": [string]}]}. "children" lists ids of other nodes and may be omitted for leaves. Spread positions between -10 and 10 on each axis."#;

const FLASHCARDS_SYSTEM: &str = r#"You create revision flashcards. Respond ONLY with a JSON array of 5 to 10 objects and no other text, each shaped as {"id": string, "question": string, "answer": string}. Keep answers short."#;

/// Maps a task onto its model tier, prompts and sampling budget.
///
/// `prompt` is only used by [`Task::AskDoubt`]; when it is missing or blank the
/// content itself is treated as the question.
pub fn select_prompt(
    task: Task,
    content: &str,
    prompt: Option<&str>,
    models: &ModelConfig,
) -> TaskPrompt {
    let (tier, system, user, temperature, max_tokens) = match task {
        Task::Summarize => (
            ModelTier::Default,
            SUMMARIZE_SYSTEM,
            format!("Summarize the following content:\n\n{content}"),
            0.3,
            1024,
        ),
        Task::Quiz => (
            ModelTier::Reasoning,
            QUIZ_SYSTEM,
            format!("Create a 5-question multiple-choice quiz from the following content:\n\n{content}"),
            0.7,
            1500,
        ),
        Task::AskDoubt => {
            let user = match prompt.map(str::trim).filter(|p| !p.is_empty()) {
                Some(question) => {
                    format!("Study material:\n\n{content}\n\nStudent's question: {question}")
                }
                None => format!("Student's question: {content}"),
            };
            (ModelTier::Default, ASKDOUBT_SYSTEM, user, 0.4, 1024)
        }
        Task::MindMap => (
            ModelTier::Reasoning,
            MINDMAP_SYSTEM,
            format!("Create a mind map for the following content:\n\n{content}"),
            0.7,
            2000,
        ),
        Task::Flashcards => (
            ModelTier::Default,
            FLASHCARDS_SYSTEM,
            format!("Create flashcards for the following content:\n\n{content}"),
            0.5,
            1500,
        ),
    };

    TaskPrompt {
        model: models.resolve(tier).to_string(),
        system_prompt: system.to_string(),
        user_prompt: user,
        temperature,
        max_tokens,
    }
}
