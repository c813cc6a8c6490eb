//! OpenAI 兼容 API 后端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）：chat completions 生成课程计划，
//! images 生成配图。响应在此适配为 String / ImagePayload，错误映射为 LlmError。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::types::images::{
    CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat, ImageSize,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::{validate_image_size, LlmSection};
use crate::core::GenerationError;
use crate::llm::{GenerationBackend, ImagePayload, ImageRequest, LlmError};
use crate::prompt::{Message, Role};

/// OpenAI 兼容后端：持有 Client 与模型参数，每次请求 n=1
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    text_model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    image_model: String,
    image_size: ImageSize,
    response_format: Option<ImageResponseFormat>,
}

impl OpenAiBackend {
    /// 由配置与已校验的 API Key 构建；请求超时作用于底层 HTTP 客户端
    ///
    /// async-openai 自带的 429/5xx 重试被关闭：每次 generate_* 只发一次 HTTP 请求，
    /// 重试次数与退避完全由 RetryExecutor 决定。
    pub fn new(llm: &LlmSection, api_key: &str) -> Result<Self, GenerationError> {
        let config = match llm.base_url.as_deref() {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        let image_size = validate_image_size(&llm.image.size)
            .map(parse_image_size)?
            .ok_or_else(|| {
                GenerationError::InvalidConfig(format!("unsupported image size {:?}", llm.image.size))
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.timeouts.request))
            .build()
            .map_err(|e| GenerationError::InvalidConfig(format!("http client: {e}")))?;

        let single_attempt = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::ZERO),
            ..Default::default()
        };

        Ok(Self {
            client: Client::with_config(config)
                .with_http_client(http)
                .with_backoff(single_attempt),
            text_model: llm.text.model.clone(),
            temperature: llm.text.temperature,
            max_tokens: llm.text.max_tokens,
            top_p: llm.text.top_p,
            image_model: llm.image.model.clone(),
            image_size,
            response_format: llm
                .image
                .response_format
                .as_deref()
                .and_then(parse_response_format),
        })
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| {
                let msg = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                };
                msg.map_err(map_openai_error)
            })
            .collect()
    }
}

fn parse_response_format(s: &str) -> Option<ImageResponseFormat> {
    match s.trim().to_lowercase().as_str() {
        "b64_json" | "b64" => Some(ImageResponseFormat::B64Json),
        "url" => Some(ImageResponseFormat::Url),
        _ => None,
    }
}

fn parse_image_size(s: &str) -> Option<ImageSize> {
    match s.trim() {
        "256x256" => Some(ImageSize::S256x256),
        "512x512" => Some(ImageSize::S512x512),
        "1024x1024" => Some(ImageSize::S1024x1024),
        _ => None,
    }
}

/// 超时与限流单独识别，其余交给 LlmError::from_message 按文本分类
fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::ApiError(e) if e.code.as_deref() == Some("rate_limit_exceeded") => {
            LlmError::RateLimited { retry_after_ms: 0 }
        }
        OpenAIError::Reqwest(e) if e.is_timeout() => LlmError::Timeout(e.to_string()),
        OpenAIError::Reqwest(e) => LlmError::Network(e.to_string()),
        other => LlmError::from_message(other.to_string()),
    }
}

/// 空字符串视为缺失
fn image_to_payload(image: &Image) -> Option<ImagePayload> {
    match image {
        Image::B64Json { b64_json, .. } if !b64_json.is_empty() => {
            Some(ImagePayload::Inline(b64_json.to_string()))
        }
        Image::Url { url, .. } if !url.is_empty() => Some(ImagePayload::Remote(url.clone())),
        _ => None,
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate_text(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.text_model)
            .messages(self.to_openai_messages(messages)?)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .top_p(self.top_p)
            .n(1)
            .build()
            .map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "lesson plan token usage"
            );
        }

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::InvalidResponse("no content in first choice".to_string()))
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>, LlmError> {
        let size = match parse_image_size(&request.size) {
            Some(size) => size,
            None if request.size.trim().is_empty() => self.image_size,
            None => {
                return Err(LlmError::Api {
                    status: None,
                    message: format!("unsupported image size {:?}", request.size),
                })
            }
        };

        let mut args = CreateImageRequestArgs::default();
        args.prompt(request.prompt.clone())
            .model(ImageModel::Other(self.image_model.clone()))
            .size(size)
            .n(1);
        if let Some(format) = self.response_format.clone() {
            args.response_format(format);
        }
        let req = args.build().map_err(map_openai_error)?;

        let response = self
            .client
            .images()
            .generate(req)
            .await
            .map_err(map_openai_error)?;

        Ok(response
            .data
            .first()
            .and_then(|image| image_to_payload(image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_format() {
        assert!(matches!(
            parse_response_format("b64_json"),
            Some(ImageResponseFormat::B64Json)
        ));
        assert!(matches!(
            parse_response_format(" URL "),
            Some(ImageResponseFormat::Url)
        ));
        assert!(parse_response_format("png").is_none());
    }

    #[test]
    fn test_parse_image_size_only_known_squares() {
        assert!(matches!(parse_image_size("512x512"), Some(ImageSize::S512x512)));
        assert!(matches!(parse_image_size(" 1024x1024"), Some(ImageSize::S1024x1024)));
        assert!(parse_image_size("huge").is_none());
        assert!(parse_image_size("1792x1024").is_none());
    }

    #[test]
    fn test_new_rejects_unsupported_image_size() {
        let mut llm = LlmSection::default();
        assert!(OpenAiBackend::new(&llm, "sk-test").is_ok());

        llm.image.size = "1792x1024".to_string();
        assert!(matches!(
            OpenAiBackend::new(&llm, "sk-test"),
            Err(GenerationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rate_limit_code_maps_to_rate_limited() {
        let err = OpenAIError::ApiError(async_openai::error::ApiError {
            message: "Rate limit reached for requests".to_string(),
            r#type: Some("requests".to_string()),
            param: None,
            code: Some("rate_limit_exceeded".to_string()),
        });
        let mapped = map_openai_error(err);
        assert!(matches!(mapped, LlmError::RateLimited { .. }));
        assert!(mapped.is_transient());
    }
}
