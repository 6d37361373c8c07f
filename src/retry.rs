use crate::errors::{AppError, GitError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_DELAY_SECONDS: u64 = 2;
const DEFAULT_MAX_DELAY_SECONDS: u64 = 60;

/// 指数退避重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_secs(DEFAULT_INITIAL_DELAY_SECONDS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECONDS),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// 第 `attempt` 次失败（从 1 开始）之后的等待时间
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// 执行 git 操作，只在 [`GitError::is_transient`] 为真时重试
///
/// 非暂时性错误立即返回；重试次数耗尽时返回 [`AppError::RetriesExhausted`]。
pub async fn retry_git<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(AppError::Git(e)),
            Err(e) if attempt >= policy.max_attempts => {
                return Err(AppError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: e,
                })
            }
            Err(e) => {
                let wait = policy.delay_after(attempt);
                tracing::warn!(
                    "{} 第 {} 次失败，{:?} 后重试: {}",
                    operation,
                    attempt,
                    wait,
                    e
                );
                sleep(wait).await;
            }
        }
    }
}
