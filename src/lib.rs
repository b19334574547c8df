pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod resume;
pub mod scraper;
pub mod session;

use std::sync::Arc;
use config::Config;
use generator::OutreachGenerator;
use llm::GeminiClient;
use session::SessionStore;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub generator: OutreachGenerator,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let generator = OutreachGenerator::new(
            GeminiClient::new(config.upstream.clone()),
            config.source_text_cap,
            config.fetch_timeout,
        );
        let session_ttl = chrono::Duration::from_std(config.session_ttl).unwrap_or(chrono::Duration::MAX);

        AppState {
            config: Arc::new(config),
            generator,
            sessions: SessionStore::new(session_ttl),
        }
    }
}
