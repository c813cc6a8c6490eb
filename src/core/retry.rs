//! RetryExecutor：有界重试 + 指数退避
//!
//! 瞬时错误（LlmError::is_transient）在仍有剩余次数时等待 base·2^(attempt-1) 秒后重试，
//! 最后一次仍失败则返回 RetryExhausted；非瞬时错误立即返回 NonTransient，不等待也不再尝试。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RetrySection;
use crate::core::GenerationError;
use crate::llm::LlmError;

/// 退避通知中错误文本的最大字符数
const NOTICE_MAX_CHARS: usize = 200;

/// 重试策略：不可变，构造时校验
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_secs: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_secs: f64) -> Result<Self, GenerationError> {
        if max_attempts == 0 {
            return Err(GenerationError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !base_delay_secs.is_finite() || base_delay_secs <= 0.0 {
            return Err(GenerationError::InvalidConfig(format!(
                "retry.base_delay_secs must be a positive number, got {base_delay_secs}"
            )));
        }
        Ok(Self {
            max_attempts,
            base_delay_secs,
        })
    }

    pub fn from_config(section: &RetrySection) -> Result<Self, GenerationError> {
        Self::new(section.max_attempts, section.base_delay_secs)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 attempt 次（从 1 开始）失败后的等待时长；超出 Duration 可表示范围时取 Duration::MAX
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay_secs * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 4.0,
        }
    }
}

/// 退避等待；生产环境用 tokio，测试可替换为记录型实现
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 重试执行器：持有策略与 Sleeper，串行地执行操作
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// 执行 operation，最多 max_attempts 次；成功立即返回
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max = self.policy.max_attempts;
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                tracing::error!(attempt, error = %err, "non-transient backend failure");
                return Err(GenerationError::NonTransient(err));
            }
            if attempt >= max {
                tracing::error!(attempts = max, error = %err, "retries exhausted");
                return Err(GenerationError::RetryExhausted {
                    attempts: max,
                    source: err,
                });
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                "Attempt {}/{} failed ({}). Retrying in {:.1}s…",
                attempt,
                max,
                truncate(&err.to_string(), NOTICE_MAX_CHARS),
                delay.as_secs_f64()
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect::<String>() + "..."
}
