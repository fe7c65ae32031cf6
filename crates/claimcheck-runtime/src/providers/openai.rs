//! Vision-language generation over an OpenAI-compatible chat API.
//!
//! Most self-hosted VLM servers (vLLM, TGI, llama.cpp) expose
//! `/chat/completions` with image parts passed as data URLs. One user
//! message carries the image followed by the verification prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{
    error_message, http_client, secrets::ApiCredential, transport_error, ProviderError,
    VisionLanguageModel,
};
use crate::image::EncodedImage;

/// A vision-language model behind an OpenAI-compatible endpoint.
pub struct OpenAiVisionModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    credential: Option<Arc<ApiCredential>>,
    timeout: Duration,
}

impl std::fmt::Debug for OpenAiVisionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiVisionModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("credential", &self.credential)
            .finish()
    }
}

impl OpenAiVisionModel {
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        credential: Option<Arc<ApiCredential>>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ProviderError::NotConfigured("vision model name is empty".into()));
        }

        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ProviderError::NotConfigured(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(timeout)?,
            base_url,
            model,
            credential,
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    ImageUrl { image_url: ImageUrl },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, image: &EncodedImage, prompt: &'a str, max_tokens: u32) -> Self {
        Self {
            model,
            max_tokens,
            // Greedy decoding keeps verdicts reproducible
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.to_data_url(),
                        },
                    },
                    ContentPart::Text { text: prompt },
                ],
            }],
        }
    }
}

#[async_trait]
impl VisionLanguageModel for OpenAiVisionModel {
    async fn generate(
        &self,
        image: &EncodedImage,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<String, ProviderError> {
        let body = ChatRequest::new(&self.model, image, prompt, max_new_tokens);

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(credential) = &self.credential {
            request = request.header("authorization", credential.bearer());
        }

        tracing::debug!(model = %self.model, max_new_tokens, "Sending generation request");

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::Parse("response has no choices".to_string()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::decode_image;
    use crate::image::tests::png_data_url;

    #[test]
    fn test_request_wire_format() {
        let image = decode_image(&png_data_url()).unwrap();
        let body = ChatRequest::new("llava", &image, "Describe", 256);
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "llava");
        assert_eq!(value["max_tokens"], 256);
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"][0]["type"], "image_url");
        assert_eq!(
            value["messages"][0]["content"][0]["image_url"]["url"],
            png_data_url().as_str()
        );
        assert_eq!(value["messages"][0]["content"][1]["type"], "text");
        assert_eq!(value["messages"][0]["content"][1]["text"], "Describe");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"id": "x", "choices": [{"index": 0, "message": {"role": "assistant", "content": "VERIFIED"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("VERIFIED"));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let model = OpenAiVisionModel::new(
            "llava-hf/llava-1.5-7b-hf",
            "http://localhost:8000/v1/",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(model.endpoint(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = OpenAiVisionModel::new("m", "localhost:8000", None, Duration::from_secs(5));
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }
}
