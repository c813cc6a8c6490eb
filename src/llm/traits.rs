//! 生成后端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 GenerationBackend：generate_text（课程计划）、generate_image（配图）。
//! 失败一律以 LlmError 返回，由 RetryExecutor 按 is_transient 决定是否重试。

use async_trait::async_trait;
use thiserror::Error;

use crate::prompt::Message;

/// 后端调用错误（类型化，可直接判断是否为瞬时错误）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Rate limited (429), retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("API error (status {status:?}): {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 错误文本中代表瞬时失败的标记（小写比较）
const TRANSIENT_MARKERS: [&str; 3] = ["429", "rate limit", "timeout"];

impl LlmError {
    /// 从未类型化的错误文本构造：能识别出 429 / timeout 时给出具体变体，否则归为 Api
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("rate limit") {
            LlmError::RateLimited { retry_after_ms: 0 }
        } else if lower.contains("timeout") || lower.contains("timed out") {
            LlmError::Timeout(message)
        } else {
            LlmError::Api {
                status: None,
                message,
            }
        }
    }

    /// 是否值得重试：类型化变体优先，其余回退到错误文本的标记匹配
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Timeout(_) => true,
            LlmError::Api {
                status: Some(429 | 408),
                ..
            } => true,
            other => {
                let text = other.to_string().to_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| text.contains(m))
            }
        }
    }
}

/// 图片生成结果：内联 base64 或可下载 URL，二者只会出现其一
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Inline(String),
    Remote(String),
}

/// 图片生成请求（prompt 由 PromptBuilder 渲染）
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: String,
}

/// 生成后端 trait：文本（取首个候选内容）与图片（取首条数据）
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_text(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 成功但既无内联数据也无 URL 时返回 Ok(None)，由编排器判定为 MissingImageData
    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_variants_are_transient() {
        assert!(LlmError::RateLimited { retry_after_ms: 1000 }.is_transient());
        assert!(LlmError::Timeout("read".into()).is_transient());
        assert!(LlmError::Api {
            status: Some(429),
            message: "slow down".into()
        }
        .is_transient());
    }

    #[test]
    fn test_marker_fallback_is_case_insensitive() {
        let err = LlmError::Network("Operation TIMEOUT while connecting".into());
        assert!(err.is_transient());
        let err = LlmError::Api {
            status: None,
            message: "Rate Limit reached for gpt-4o".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_other_errors_are_fatal() {
        let err = LlmError::Api {
            status: Some(401),
            message: "Incorrect API key provided".into(),
        };
        assert!(!err.is_transient());
        assert!(!LlmError::InvalidResponse("empty choices".into()).is_transient());
    }

    #[test]
    fn test_from_message_classifies() {
        assert!(matches!(
            LlmError::from_message("HTTP 429 Too Many Requests"),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            LlmError::from_message("request timed out"),
            LlmError::Timeout(_)
        ));
        assert!(matches!(
            LlmError::from_message("invalid model"),
            LlmError::Api { status: None, .. }
        ));
    }
}
