use crate::domain::model::{CardImages, ContactRecord};
use crate::domain::ports::CardExtractor;
use crate::utils::error::{CardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

pub const EXTRACTION_PROMPT: &str = "You are an expert business card data extractor. \
You will be given one or two images of a business card (front and back). \
Read the text from all provided images and merge the information into a single, complete contact profile. \
Extract the key information as a JSON object with exactly these fields: \
organization, name, designation, contact, email, website, address, remarks. \
Leave remarks as an empty string; it is filled in later by a person. \
If a field is not found, use an empty string \"\" as its value; never omit a field and never use null. \
Your response MUST be ONLY the JSON object, with no extra text, explanations, or markdown formatting.";

pub const NO_DATA_MESSAGE: &str =
    "AI model did not return any data. The image may be unclear or contain restricted content.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Card extractor backed by an OpenAI-compatible chat completions API.
pub struct OpenAiExtractor {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiExtractor {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn build_request<'a>(&'a self, front: &'a str, back: Option<&'a str>) -> ChatRequest<'a> {
        let mut content = vec![
            ContentPart::Text {
                text: EXTRACTION_PROMPT,
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: front },
            },
        ];
        if let Some(back) = back {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl { url: back },
            });
        }

        ChatRequest {
            model: &self.model,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
        }
    }
}

/// Decodes the model's text reply into a contact record.
pub fn decode_contact(content: Option<&str>) -> Result<ContactRecord> {
    let text = content
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CardError::extraction(NO_DATA_MESSAGE))?;

    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        CardError::extraction(format!("OpenAI API call failed: response is not valid JSON ({})", e))
    })?;

    let object = value.as_object().ok_or_else(|| {
        CardError::extraction("OpenAI API call failed: response is not a JSON object")
    })?;

    let (record, dropped) = ContactRecord::from_json_object(object);
    if !dropped.is_empty() {
        tracing::debug!("Ignoring unexpected extractor fields: {:?}", dropped);
    }

    Ok(record)
}

#[async_trait]
impl CardExtractor for OpenAiExtractor {
    async fn extract(&self, images: &CardImages) -> Result<ContactRecord> {
        let (front, back) = images.require_front()?;
        let body = self.build_request(front, back);

        tracing::info!(
            "🔍 Extracting card fields with {} ({} image(s))",
            self.model,
            if back.is_some() { 2 } else { 1 }
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CardError::ApiError(e)
                } else {
                    CardError::extraction(format!("OpenAI API call failed: {}", e))
                }
            })?;

        let status = response.status();
        tracing::debug!("Extraction API response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CardError::extraction(format!(
                "OpenAI API call failed: {} {}",
                status, error_body
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            CardError::extraction(format!("OpenAI API call failed: unreadable response ({})", e))
        })?;

        let content = chat
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref());

        decode_contact(content)
    }
}
