//! 生成流程错误类型
//!
//! 致命错误一律传播到流程边界（课程计划流程 / 配图流程），由调用方报告并终止该流程；
//! Schema 校验失败不在此列，只产生警告（见 ContentValidator）。

use thiserror::Error;

use crate::llm::LlmError;

/// 编排过程中可能出现的错误（凭证、重试耗尽、非瞬时失败、图片数据缺失、下载、IO 等）
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Missing credential: set OPENAI_API_KEY in the environment or .env")]
    MissingCredential,

    /// 瞬时错误（429 / rate limit / timeout）在用尽全部尝试后仍失败
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: LlmError,
    },

    /// 非瞬时错误：立即传播，不再重试
    #[error("Non-transient backend failure: {0}")]
    NonTransient(#[source] LlmError),

    #[error("Image response contains neither inline data nor URL")]
    MissingImageData,

    #[error("Image download failed: {0}")]
    DownloadFailure(String),

    #[error("Inline image decode failed: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
