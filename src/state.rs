use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, ResponseCache};
use crate::config::Args;
use crate::error::ProxyError;
use crate::models::ProxyRequest;
use crate::prompts::{ModelConfig, Task, select_prompt};
use crate::upstream::{RetryPolicy, UpstreamClient};

// app's shared state
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
    pub cache: Arc<ResponseCache>,
    pub models: ModelConfig,
}

impl AppState {
    pub fn new(upstream: UpstreamClient, cache: ResponseCache, models: ModelConfig) -> Self {
        Self {
            upstream: Arc::new(upstream),
            cache: Arc::new(cache),
            models,
        }
    }

    /// Builds the state from the command line. Refuses to start without a credential.
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let api_key = args.api_key.trim();
        if api_key.is_empty() {
            anyhow::bail!("an upstream API key is required (--api-key or GROQ_API_KEY)");
        }

        let policy = RetryPolicy {
            max_attempts: args.max_attempts,
            base_delay: Duration::from_millis(args.backoff_base_ms),
            attempt_timeout: Duration::from_secs(args.attempt_timeout),
        };
        let upstream = UpstreamClient::new(
            reqwest::Client::new(),
            args.upstream_url.clone(),
            api_key.to_string(),
            policy,
        );
        let cache = ResponseCache::new(Duration::from_secs(args.cache_ttl), args.cache_capacity);
        let models = ModelConfig {
            default_model: args.default_model.clone(),
            reasoning_model: args.reasoning_model.clone(),
        };
        Ok(Self::new(upstream, cache, models))
    }

    /// Full pipeline: task selection, then a cached / coalesced upstream call.
    pub async fn complete(&self, request: ProxyRequest) -> Result<String, ProxyError> {
        let task: Task = request.task.parse()?;
        let prompt_text = request.prompt.as_deref();

        let key = CacheKey::new(task, &request.content, prompt_text);
        let prompt = select_prompt(task, &request.content, prompt_text, &self.models);
        let upstream = Arc::clone(&self.upstream);

        tracing::debug!(%task, model = %prompt.model, "handling study request");
        self.cache
            .get_or_fetch(key, move || async move { upstream.complete(&prompt).await })
            .await
    }
}
