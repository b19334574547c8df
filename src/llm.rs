use serde::{Deserialize, Serialize};
use reqwest::{Client, StatusCode};
use crate::config::UpstreamConfig;
use crate::error::GenerateError;
use crate::scraper::truncate_chars;

/// Header carrying the credential; keeps it out of URLs and therefore out of error text.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Longest slice of an upstream error body echoed back in a diagnostic.
const MAX_ERROR_BODY_CHARS: usize = 500;

fn unavailable(err: reqwest::Error) -> GenerateError {
    GenerateError::UpstreamUnavailable(err.without_url().to_string())
}

async fn rejected(res: reqwest::Response, model: &str) -> GenerateError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    GenerateError::UpstreamRejected {
        model: model.to_string(),
        status,
        body: truncate_chars(&body, MAX_ERROR_BODY_CHARS).to_string(),
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Text at `candidates[0].content.parts[0].text`, untouched.
    pub fn into_text(self) -> Result<String, GenerateError> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or(GenerateError::NoCandidates)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelList {
    /// First model advertising `method`, with any `models/` style prefix removed.
    pub fn first_supporting(&self, method: &str) -> Option<String> {
        self.models
            .iter()
            .find(|m| m.supported_generation_methods.iter().any(|s| s == method))
            .map(|m| bare_model_id(&m.name).to_string())
    }
}

pub fn bare_model_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Thin client over the Gemini `models` endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    config: UpstreamConfig,
}

impl GeminiClient {
    pub fn new(config: UpstreamConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        GeminiClient { http, config }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// `GET {base}/models` and pick the first model supporting the generation method.
    pub async fn discover_model(&self, api_key: &str) -> Result<String, GenerateError> {
        let url = format!("{}/models", self.config.base_url);
        let res = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(unavailable)?;

        if res.status() != StatusCode::OK {
            return Err(rejected(res, "models").await);
        }

        let list: ModelList = res.json().await.map_err(|e| {
            GenerateError::UpstreamUnavailable(format!("malformed model list: {}", e.without_url()))
        })?;

        list.first_supporting(&self.config.generation_method)
            .ok_or_else(|| GenerateError::NoCapableModel(self.config.generation_method.clone()))
    }

    /// One generation attempt against one model.
    pub async fn generate(&self, api_key: &str, model: &str, prompt: &str) -> Result<String, GenerateError> {
        let url = format!(
            "{}/models/{}:{}",
            self.config.base_url, model, self.config.generation_method
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let res = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        if res.status() != StatusCode::OK {
            return Err(rejected(res, model).await);
        }

        let parsed: GenerateResponse = res
            .json()
            .await
            .map_err(|_| GenerateError::NoCandidates)?;
        parsed.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_candidate_text_verbatim() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"  Hi there\n"},{"text":"ignored"}]}},{"content":{"parts":[{"text":"second"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_text().unwrap(), "  Hi there\n");
    }

    #[test]
    fn missing_candidates_is_a_typed_error() {
        for raw in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{}]}}]}"#,
        ] {
            let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
            assert_eq!(parsed.into_text(), Err(GenerateError::NoCandidates), "{raw}");
        }
    }

    #[test]
    fn discovery_picks_first_capable_model() {
        let raw = r#"{"models":[
            {"name":"models/embedding-001","supportedGenerationMethods":["embedContent"]},
            {"name":"models/gemini-1.5-flash","supportedGenerationMethods":["generateContent","countTokens"]},
            {"name":"models/gemini-pro","supportedGenerationMethods":["generateContent"]}
        ]}"#;
        let list: ModelList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.first_supporting("generateContent").as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(list.first_supporting("streamGenerateContent"), None);
    }

    #[test]
    fn namespace_prefix_is_stripped() {
        assert_eq!(bare_model_id("models/foo"), "foo");
        assert_eq!(bare_model_id("tunedModels/x/y"), "y");
        assert_eq!(bare_model_id("plain"), "plain");
    }
}
