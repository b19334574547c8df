//! Turns a target into a completion: scrape, prompt, then walk the model
//! candidates until the upstream service answers.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::GenerateError;
use crate::llm::GeminiClient;
use crate::scraper::{normalize_target, page_client, scrape_target, truncate_chars};
use crate::session::{ChatMessage, ChatRole, ModelCache};

/// Only the most recent turns are replayed to the model.
const CHAT_HISTORY_WINDOW: usize = 20;

/// Result of one generation request. Failures are folded into a diagnostic
/// so callers always get something to show.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Generated { text: String, model: String },
    Diagnostic { error: GenerateError, text: String },
}

impl Completion {
    pub fn diagnostic(error: GenerateError) -> Self {
        let text = error.to_string();
        Completion::Diagnostic { error, text }
    }

    pub fn text(&self) -> &str {
        match self {
            Completion::Generated { text, .. } | Completion::Diagnostic { text, .. } => text,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            Completion::Generated { model, .. } => Some(model),
            Completion::Diagnostic { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&GenerateError> {
        match self {
            Completion::Generated { .. } => None,
            Completion::Diagnostic { error, .. } => Some(error),
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Completion::Generated { .. })
    }
}

pub fn outreach_prompt(source_text: &str, cap: usize) -> String {
    format!(
        "Analyze this content: {}. Write a short cold email for AI services.",
        truncate_chars(source_text, cap)
    )
}

pub fn resume_prompt(resume_text: &str, cap: usize) -> String {
    format!(
        "Summarize this resume and match skills: {}",
        truncate_chars(resume_text, cap)
    )
}

pub fn chat_prompt(history: &[ChatMessage]) -> String {
    let start = history.len().saturating_sub(CHAT_HISTORY_WINDOW);
    let mut prompt = String::from(
        "You are a concise assistant for sales outreach and hiring. Continue the conversation.\n\n",
    );
    for message in &history[start..] {
        let speaker = match message.role {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str("Assistant:");
    prompt
}

#[derive(Clone)]
pub struct OutreachGenerator {
    client: GeminiClient,
    pages: reqwest::Client,
    source_text_cap: usize,
    fetch_timeout: Duration,
}

impl OutreachGenerator {
    pub fn new(client: GeminiClient, source_text_cap: usize, fetch_timeout: Duration) -> Self {
        OutreachGenerator {
            client,
            pages: page_client(),
            source_text_cap,
            fetch_timeout,
        }
    }

    /// Scrapes `target` and drafts a cold email from its text.
    pub async fn generate(&self, target: &str, credential: &str, cache: &ModelCache) -> Completion {
        if credential.trim().is_empty() {
            return Completion::diagnostic(GenerateError::MissingCredential);
        }

        let source_text = match scrape_target(&self.pages, target, self.source_text_cap, self.fetch_timeout).await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %normalize_target(target), error = %e, "could not read target");
                return Completion::diagnostic(GenerateError::FetchFailed(normalize_target(target)));
            }
        };

        let prompt = outreach_prompt(&source_text, self.source_text_cap);
        self.complete(&prompt, credential, cache).await
    }

    pub async fn analyze_resume(&self, resume_text: &str, credential: &str, cache: &ModelCache) -> Completion {
        if credential.trim().is_empty() {
            return Completion::diagnostic(GenerateError::MissingCredential);
        }
        if resume_text.trim().is_empty() {
            return Completion::diagnostic(GenerateError::FetchFailed("the uploaded resume".to_string()));
        }

        let prompt = resume_prompt(resume_text, self.source_text_cap);
        self.complete(&prompt, credential, cache).await
    }

    pub async fn chat(&self, history: &[ChatMessage], credential: &str, cache: &ModelCache) -> Completion {
        self.complete(&chat_prompt(history), credential, cache).await
    }

    /// Sends `prompt` to the first model that answers with HTTP 200.
    pub async fn complete(&self, prompt: &str, credential: &str, cache: &ModelCache) -> Completion {
        if credential.trim().is_empty() {
            return Completion::diagnostic(GenerateError::MissingCredential);
        }

        let (preferred, from_cache) = self.resolve_model(credential, cache).await;
        let mut last_error = GenerateError::NoCandidates;

        for model in self.candidates(&preferred) {
            debug!(model = %model, prompt_length = prompt.len(), "calling generation endpoint");
            match self.client.generate(credential, &model, prompt).await {
                Ok(text) => {
                    info!(model = %model, response_length = text.len(), "generation succeeded");
                    cache.set(credential, &model);
                    return Completion::Generated { text, model };
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "generation attempt failed");
                    if from_cache && model == preferred {
                        cache.evict(credential, &model);
                    }
                    last_error = e;
                }
            }
        }

        Completion::diagnostic(last_error)
    }

    /// Cached model for this credential, else discovery, else the default.
    async fn resolve_model(&self, credential: &str, cache: &ModelCache) -> (String, bool) {
        if let Some(model) = cache.get(credential) {
            debug!(model = %model, "using cached model");
            return (model, true);
        }

        match self.client.discover_model(credential).await {
            Ok(model) => {
                info!(model = %model, "discovered model");
                (model, false)
            }
            Err(e) => {
                let fallback = self.default_model().to_string();
                warn!(error = %e, fallback = %fallback, "model discovery failed");
                (fallback, false)
            }
        }
    }

    fn default_model(&self) -> &str {
        self.client
            .config()
            .models
            .first()
            .map(String::as_str)
            .unwrap_or(crate::config::DEFAULT_MODELS[0])
    }

    fn candidates(&self, preferred: &str) -> Vec<String> {
        let mut models = vec![preferred.to_string()];
        for model in &self.client.config().models {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }
}
