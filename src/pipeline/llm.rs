//! Vision extraction: one page image + prompt → typed extraction.
//!
//! Two layers live here:
//!
//! * [`VisionModel`] is the seam to the external service. It takes a fully
//!   built [`VisionRequest`] and returns the model's message text.
//!   [`OpenAiCompatClient`] speaks the OpenAI chat-completions dialect used
//!   by LM Studio, vLLM and friends; tests inject their own implementation.
//!
//! * [`extract_id_card_page`] / [`extract_passport_page`] encode the page,
//!   call the model, and turn its text into an extraction. A non-JSON answer
//!   is recovered here as an all-null record (`raw_response` set); only
//!   transport and envelope failures propagate.
//!
//! Every call is stateless: no conversation history is sent, and nothing is
//! retried. Retry policy belongs to the caller.

use crate::config::AnalysisConfig;
use crate::document::DocumentType;
use crate::error::VerifyError;
use crate::extraction::{IdCardExtraction, PassportExtraction};
use crate::pipeline::encode::{encode_jpeg_base64, jpeg_data_uri};
use crate::pipeline::postprocess::clean_model_json;
use crate::pipeline::render::PageImage;
use crate::prompts::{system_prompt, user_instruction};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A single-turn request to the vision model.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system_prompt: String,
    pub instruction: String,
    /// Base64 JPEG, without the `data:` prefix.
    pub image_b64: String,
}

/// Anything that can answer a [`VisionRequest`] with the model's text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: &VisionRequest) -> Result<String, VerifyError>;
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "input_image")]
    InputImage { image_url: ImageUrl },
    #[serde(rename = "text")]
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ── HTTP client ──────────────────────────────────────────────────────────

/// [`VisionModel`] over an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatClient {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VerifyError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn payload<'a>(&'a self, request: &'a VisionRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::InputImage {
                            image_url: ImageUrl {
                                url: jpeg_data_uri(&request.image_b64),
                            },
                        },
                        ContentPart::Text {
                            text: &request.instruction,
                        },
                    ]),
                },
            ],
        }
    }
}

#[async_trait]
impl VisionModel for OpenAiCompatClient {
    async fn complete(&self, request: &VisionRequest) -> Result<String, VerifyError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| VerifyError::UpstreamRequest {
                detail: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VerifyError::UpstreamRequest {
                detail: format!("reading response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(VerifyError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        message_content(&body)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions body.
fn message_content(body: &str) -> Result<String, VerifyError> {
    let envelope_error = || VerifyError::UpstreamEnvelope {
        detail: body.to_string(),
    };
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|_| envelope_error())?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(envelope_error)
}

// ── Extraction ───────────────────────────────────────────────────────────

fn build_request(
    page: &PageImage,
    doc_type: DocumentType,
    jpeg_quality: u8,
) -> Result<VisionRequest, VerifyError> {
    let image_b64 = encode_jpeg_base64(&page.image, jpeg_quality).map_err(|e| {
        VerifyError::Internal(format!("JPEG encoding failed for page {}: {}", page.index + 1, e))
    })?;
    Ok(VisionRequest {
        system_prompt: system_prompt(doc_type).to_string(),
        instruction: user_instruction(doc_type).to_string(),
        image_b64,
    })
}

async fn complete_page(
    model: &dyn VisionModel,
    page: &PageImage,
    doc_type: DocumentType,
    jpeg_quality: u8,
) -> Result<String, VerifyError> {
    let start = Instant::now();
    let request = build_request(page, doc_type, jpeg_quality)?;
    let content = model.complete(&request).await?;
    debug!(
        "Page {}: {} chars from vision model in {:?}",
        page.index + 1,
        content.len(),
        start.elapsed()
    );
    Ok(content)
}

/// Read one ID-card page.
pub async fn extract_id_card_page(
    model: &dyn VisionModel,
    page: &PageImage,
    jpeg_quality: u8,
) -> Result<IdCardExtraction, VerifyError> {
    let content = complete_page(model, page, DocumentType::IdCard, jpeg_quality).await?;
    let extraction = parse_id_card(&content);
    if extraction.is_malformed() {
        warn!("Page {}: model answer is not JSON, page ignored", page.index + 1);
    } else {
        debug!("Page {}: face = {}", page.index + 1, extraction.side.as_str());
    }
    Ok(extraction)
}

/// Read the biographic page of a passport.
pub async fn extract_passport_page(
    model: &dyn VisionModel,
    page: &PageImage,
    jpeg_quality: u8,
) -> Result<PassportExtraction, VerifyError> {
    let content = complete_page(model, page, DocumentType::Passport, jpeg_quality).await?;
    let extraction = parse_passport(&content);
    if extraction.is_malformed() {
        warn!("Page {}: model answer is not JSON, page ignored", page.index + 1);
    }
    Ok(extraction)
}

/// Parse a model answer for an ID-card page, falling back to an all-null record.
pub fn parse_id_card(content: &str) -> IdCardExtraction {
    parse_answer(content).unwrap_or_else(|| IdCardExtraction::malformed(content))
}

/// Parse a model answer for a passport page, falling back to an all-null record.
pub fn parse_passport(content: &str) -> PassportExtraction {
    parse_answer(content).unwrap_or_else(|| PassportExtraction::malformed(content))
}

/// Decode through `Value` first: a repeated key keeps its last value
/// instead of failing the derived struct with "duplicate field".
fn parse_answer<T: DeserializeOwned>(content: &str) -> Option<T> {
    match serde_json::from_str::<Value>(&clean_model_json(content)) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    }
}
