use serde::{Deserialize, Serialize};

use crate::prompts::TaskPrompt;

// Body the browser posts to the proxy endpoint.
// `task` stays a plain string so unknown tasks become InvalidTask, not a decode failure
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ProxyRequest {
    pub task: String,
    #[serde(default)]
    pub prompt: Option<String>,
    pub content: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ProxyResponse {
    pub result: String,
}

// Chat-completions message format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

// Chat-completions request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl From<&TaskPrompt> for ChatRequest {
    fn from(prompt: &TaskPrompt) -> Self {
        Self {
            model: prompt.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user_prompt.clone(),
                },
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            stream: false,
        }
    }
}

// Chat-completions response format (only the parts we read)
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Choice {
    pub message: ChatMessage,
}
