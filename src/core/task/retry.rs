use log::{error, info};
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::core::error::{DownloadError, DownloadResult};

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// 包括第一次在内的最大尝试次数
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 1.0 即固定间隔
    pub backoff_multiplier: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryStrategy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_count,
            base_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            backoff_multiplier: config.retry_backoff_multiplier,
        }
    }

    /// `attempts` 为已经失败的次数
    pub fn should_retry(&self, error: &DownloadError, attempts: u32) -> bool {
        attempts < self.max_attempts && error.is_retryable()
    }

    /// 第 `attempts` 次失败后的等待时间
    pub fn get_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.max(1.0).powi(exponent);
        // 溢出或非有限值一律按上限处理
        Duration::try_from_secs_f64(delay_secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// 单次调用内的重试状态
#[derive(Debug)]
pub struct RetryContext {
    pub strategy: RetryStrategy,
    attempts: u32,
    last_error: Option<String>,
}

impl RetryContext {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy, attempts: 0, last_error: None }
    }

    /// 记录一次失败，返回当前是第几次
    pub fn record_failure(&mut self, error: &DownloadError) -> u32 {
        self.attempts += 1;
        self.last_error = Some(error.to_string());
        self.attempts
    }

    pub fn should_retry(&self, error: &DownloadError) -> bool {
        self.strategy.should_retry(error, self.attempts)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 非阻塞等待，只挂起当前任务
    pub async fn backoff(&mut self) {
        tokio::time::sleep(self.strategy.get_delay(self.attempts)).await;
    }

    pub fn into_error(self) -> DownloadError {
        DownloadError::MaxRetriesExceeded {
            attempts: self.attempts,
            last_error: self.last_error.unwrap_or_else(|| "没有记录到错误".to_string()),
        }
    }
}

/// 反复执行 `op` 直到成功、遇到不可重试的错误或次数用完。
/// 每次尝试都是从头开始，不做断点续传。
pub async fn run_with_retry<T, F, Fut>(strategy: &RetryStrategy, label: &str, mut op: F) -> DownloadResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DownloadResult<T>>,
{
    let mut context = RetryContext::new(strategy.clone());
    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let attempt = context.record_failure(&error);
        error!(
            "第 {}/{} 次尝试下载 {} 失败: {}",
            attempt, context.strategy.max_attempts, label, error
        );

        if !error.is_retryable() {
            return Err(error);
        }
        if !context.should_retry(&error) {
            error!("下载 {} 在 {} 次尝试后仍然失败", label, attempt);
            return Err(context.into_error());
        }

        info!(
            "{:.1} 秒后重试 {}...",
            context.strategy.get_delay(attempt).as_secs_f64(),
            label
        );
        context.backoff().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_strategy() -> RetryStrategy {
        RetryStrategy { base_delay: Duration::from_millis(1), ..RetryStrategy::default() }
    }

    #[test]
    fn test_fixed_delay_by_default() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.get_delay(1), Duration::from_secs(1));
        assert_eq!(strategy.get_delay(2), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_delay_capped() {
        let strategy = RetryStrategy {
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(3),
            ..RetryStrategy::default()
        };
        assert_eq!(strategy.get_delay(1), Duration::from_secs(1));
        assert_eq!(strategy.get_delay(2), Duration::from_secs(2));
        assert_eq!(strategy.get_delay(3), Duration::from_secs(3));
    }

    #[test]
    fn test_huge_multiplier_capped_at_max_delay() {
        let strategy = RetryStrategy {
            backoff_multiplier: 1e300,
            max_delay: Duration::from_secs(60),
            ..RetryStrategy::default()
        };
        assert_eq!(strategy.get_delay(1), Duration::from_secs(1));
        assert_eq!(strategy.get_delay(2), Duration::from_secs(60));
        assert_eq!(strategy.get_delay(10), Duration::from_secs(60));

        let strategy = RetryStrategy { backoff_multiplier: f64::INFINITY, ..RetryStrategy::default() };
        assert_eq!(strategy.get_delay(2), strategy.max_delay);
    }

    #[test]
    fn test_should_retry() {
        let strategy = RetryStrategy::default();
        let network = DownloadError::Network("reset".into());
        assert!(strategy.should_retry(&network, 1));
        assert!(strategy.should_retry(&network, 2));
        assert!(!strategy.should_retry(&network, 3));
        assert!(!strategy.should_retry(&DownloadError::Config("x".into()), 1));
    }

    #[tokio::test]
    async fn test_gives_up_after_three_attempts() {
        let calls = Cell::new(0);
        let result: DownloadResult<()> = run_with_retry(&fast_strategy(), "e01.mp4", || {
            calls.set(calls.get() + 1);
            async { Err(DownloadError::Network("reset".into())) }
        })
        .await;

        assert_eq!(calls.get(), 3);
        assert!(matches!(result, Err(DownloadError::MaxRetriesExceeded { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = Cell::new(0);
        let result = run_with_retry(&fast_strategy(), "e01.mp4", || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt < 3 {
                    Err(DownloadError::Timeout("read".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(tokio_test::assert_ok!(result), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Cell::new(0);
        let result: DownloadResult<()> = run_with_retry(&fast_strategy(), "e01.mp4", || {
            calls.set(calls.get() + 1);
            async { Err(DownloadError::InvalidUrl("e01".into())) }
        })
        .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(DownloadError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_context_records_failures() {
        let mut context = RetryContext::new(fast_strategy());
        context.record_failure(&DownloadError::Network("reset".into()));
        context.backoff().await;
        assert_eq!(context.attempts(), 1);
        assert!(matches!(
            context.into_error(),
            DownloadError::MaxRetriesExceeded { attempts: 1, .. }
        ));
    }
}
