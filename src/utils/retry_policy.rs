// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 可重试错误特质
///
/// 由引擎错误类型实现，用于区分瞬时失败与永久失败。
/// 永久失败绕过重试策略，立即返回给调用方。
pub trait Retryable {
    /// 判断错误是否可重试
    fn is_retryable(&self) -> bool;
}

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次尝试）
    pub max_attempts: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: false,
        }
    }
}

impl RetryPolicy {
    /// 创建标准重试策略
    pub fn standard() -> Self {
        Self::default()
    }

    /// 覆盖最大尝试次数
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// 计算下次重试的退避时间
    ///
    /// `delay = min(max_backoff, initial_backoff * multiplier^(attempt-1))`，
    /// 启用抖动时在结果上叠加 ±jitter_factor 的随机偏移
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_secs = self.initial_backoff.as_secs_f64()
            * self.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.enable_jitter {
            let jitter_range = capped_backoff * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..=jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 是否应该继续重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// 在重试策略下执行操作
    ///
    /// `operation` 接收当前尝试序号（从1开始）。成功或遇到永久错误时立即
    /// 返回；瞬时错误在退避等待后重试，尝试次数耗尽后返回最后一次错误。
    /// 第二个返回值是实际执行的尝试次数。
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> (Result<T, E>, u32)
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if !e.is_retryable() => return (Err(e), attempt),
                Err(e) => {
                    if !self.should_retry(attempt) {
                        return (Err(e), attempt);
                    }
                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        error = %e,
                        "retry attempt {} in {:?}",
                        attempt + 1,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error (retryable: {})", self.retryable)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[test]
    fn test_calculate_backoff_exponential() {
        let policy = RetryPolicy::standard();

        assert_eq!(policy.calculate_backoff(1), Duration::from_secs(1));
        assert_eq!(policy.calculate_backoff(2), Duration::from_secs(2));
        assert_eq!(policy.calculate_backoff(3), Duration::from_secs(4));
        assert_eq!(policy.calculate_backoff(4), Duration::from_secs(8));
    }

    #[test]
    fn test_calculate_backoff_max_limit() {
        let policy = RetryPolicy::standard();

        // 1 * 2^9 = 512s would far exceed the 10s ceiling
        assert_eq!(policy.calculate_backoff(10), Duration::from_secs(10));
    }

    #[test]
    fn test_calculate_backoff_with_jitter() {
        let mut policy = RetryPolicy::standard();
        policy.enable_jitter = true;
        policy.jitter_factor = 0.1;

        let backoff = policy.calculate_backoff(2);
        let expected = Duration::from_secs(2);
        let jitter_range = Duration::from_millis(200);

        assert!(backoff >= expected - jitter_range);
        assert!(backoff <= expected + jitter_range);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::standard();

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[tokio::test]
    async fn test_run_succeeds_first_attempt() {
        let policy = RetryPolicy::standard();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let (result, attempts) = policy
            .run(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_succeeds_after_transient_failures() {
        let policy = RetryPolicy::standard();

        let (result, attempts) = policy
            .run(|attempt| async move {
                if attempt < 3 {
                    Err(TestError { retryable: true })
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_run_permanent_error_bypasses_retry() {
        let policy = RetryPolicy::standard();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let (result, attempts) = policy
            .run(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(TestError { retryable: false })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausts_attempts_and_returns_last_error() {
        let policy = RetryPolicy::standard();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let (result, attempts) = policy
            .run(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(TestError { retryable: true })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_backoff_between_attempts() {
        let policy = RetryPolicy::standard();
        let start = tokio::time::Instant::now();

        let (result, _) = policy
            .run(|_| async move { Err::<u32, _>(TestError { retryable: true }) })
            .await;

        assert!(result.is_err());
        // delays after attempts 1 and 2: 1s + 2s
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
