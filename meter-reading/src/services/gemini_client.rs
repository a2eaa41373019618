//! Gemini recognition client
//!
//! Sends the staged image inline to the `generateContent` endpoint and
//! reads the first text part of the first candidate as the reading.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::services::image_codec::StagedImage;
use crate::services::recognition::{parse_reading, RecognitionError, RecognitionService};
use meter_common::config::RecognitionConfig;

const USER_AGENT: &str = concat!("meter-reading/", env!("CARGO_PKG_VERSION"));

const PROMPT: &str = "This image shows a water or gas meter. \
Reply with the numeric reading displayed on the meter and nothing else. \
Use a dot as decimal separator.";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.text.as_deref())
    }
}

/// Gemini API client
pub struct GeminiRecognizer {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiRecognizer {
    pub fn new(config: &RecognitionConfig, api_key: String) -> Result<Self, RecognitionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RecognitionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl RecognitionService for GeminiRecognizer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn recognize(&self, image: &StagedImage) -> Result<f64, RecognitionError> {
        let bytes = image
            .read()
            .await
            .map_err(|e| RecognitionError::Io(e.to_string()))?;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: PROMPT },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type(),
                            data: general_purpose::STANDARD.encode(&bytes),
                        },
                    },
                ],
            }],
        };

        debug!(model = %self.model, bytes = bytes.len(), "Querying Gemini API");

        let response = self
            .http_client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| RecognitionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Api(status.as_u16(), error_text));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Unparseable(e.to_string()))?;

        let answer = body.first_text().ok_or(RecognitionError::EmptyAnswer)?;
        let value = parse_reading(answer)?;

        info!(model = %self.model, value, "Gemini recognition successful");
        Ok(value)
    }
}
