// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::result::ScrapingResult;
use crate::domain::models::task::ScrapingTask;
use crate::domain::services::extraction_service::ExtractionService;
use crate::engines::router::EngineRouter;
use crate::engines::traits::FetchRequest;
use crate::queue::task_queue::TaskQueue;
use crate::utils::retry_policy::RetryPolicy;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 工作池运行统计
///
/// 健康检查可以在运行中的任意时刻读取的无锁计数器
#[derive(Debug, Default)]
pub struct PoolStats {
    active_workers: AtomicUsize,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
}

impl PoolStats {
    pub fn worker_busy(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn worker_idle(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn task_completed(&self) {
        self.completed_tasks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn task_failed(&self) {
        self.failed_tasks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub fn completed_tasks(&self) -> u64 {
        self.completed_tasks.load(Ordering::SeqCst)
    }

    pub fn failed_tasks(&self) -> u64 {
        self.failed_tasks.load(Ordering::SeqCst)
    }

    /// 工作器被中止后回收活跃计数
    pub fn reset_active(&self) {
        self.active_workers.store(0, Ordering::SeqCst);
    }
}

/// 抓取工作器
///
/// 从队列消费任务，执行 fetch → extract 流水线，在重试策略下
/// 处理瞬时失败，并将恰好一条结果追加到共享结果集合。
/// 工作器之间只通过队列（消费）与结果集合（生产）交互。
pub struct ScrapeWorker {
    router: Arc<EngineRouter>,
    retry_policy: RetryPolicy,
    fetch_timeout: Duration,
    results: Arc<parking_lot::Mutex<Vec<ScrapingResult>>>,
    stats: Arc<PoolStats>,
    worker_id: Uuid,
}

impl ScrapeWorker {
    /// 创建新的抓取工作器实例
    pub fn new(
        router: Arc<EngineRouter>,
        retry_policy: RetryPolicy,
        fetch_timeout: Duration,
        results: Arc<parking_lot::Mutex<Vec<ScrapingResult>>>,
        stats: Arc<PoolStats>,
    ) -> Self {
        Self {
            router,
            retry_policy,
            fetch_timeout,
            results,
            stats,
            worker_id: Uuid::new_v4(),
        }
    }

    /// 运行抓取工作器
    ///
    /// 循环消费队列直到队列关闭且排空，然后返回
    pub async fn run<Q>(&self, queue: Arc<Q>)
    where
        Q: TaskQueue + Send + Sync,
    {
        info!(worker_id = %self.worker_id, "worker started");

        while let Some(task) = queue.dequeue().await {
            self.stats.worker_busy();
            let result = self.process_task(task).await;

            if result.is_success() {
                self.stats.task_completed();
                info!(
                    task_id = %result.task_id,
                    url = %result.url,
                    attempts = result.attempts,
                    "task succeeded"
                );
            } else {
                self.stats.task_failed();
                warn!(
                    task_id = %result.task_id,
                    url = %result.url,
                    attempts = result.attempts,
                    error = result.error.as_deref().unwrap_or(""),
                    "task failed"
                );
            }

            self.results.lock().push(result);
            self.stats.worker_idle();
        }

        info!(worker_id = %self.worker_id, "queue drained, worker exiting");
    }

    /// 执行单个任务，总是产出一条结果
    #[instrument(skip(self, task), fields(task_id = %task.id, url = %task.url, scenario = %task.scenario))]
    async fn process_task(&self, task: ScrapingTask) -> ScrapingResult {
        let started = Instant::now();

        let request = FetchRequest::from_task(&task, self.fetch_timeout);
        let policy = self
            .retry_policy
            .clone()
            .with_max_attempts(task.max_retries.max(1));

        let router = self.router.clone();
        let engine = task.engine;
        let scenario = task.scenario;

        let (outcome, attempts) = policy
            .run(|_| {
                let router = router.clone();
                let request = request.clone();
                async move { router.dispatch(engine, scenario, &request).await }
            })
            .await;

        let execution_time = started.elapsed().as_secs_f64();

        match outcome {
            Ok(response) => {
                match ExtractionService::extract(&response.content, &response.content_type, &task)
                {
                    Ok(data) => ScrapingResult::success(&task, data, attempts, execution_time),
                    Err(e) => ScrapingResult::failure(&task, e.to_string(), attempts, execution_time),
                }
            }
            Err(e) => ScrapingResult::failure(&task, e.to_string(), attempts, execution_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::{EngineKind, Scenario};
    use crate::engines::traits::{EngineError, FetchEngine, FetchResponse};
    use crate::queue::task_queue::InMemoryTaskQueue;
    use async_trait::async_trait;

    struct FlakyEngine {
        succeed_on: u32,
        calls: AtomicU64,
    }

    #[async_trait]
    impl FetchEngine for FlakyEngine {
        async fn fetch(&self, _request: &FetchRequest) -> Result<FetchResponse, EngineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_on as u64 {
                Err(EngineError::HttpStatus(503))
            } else {
                Ok(FetchResponse {
                    status_code: 200,
                    content: "<html><head><title>OK</title></head><body>ok</body></html>"
                        .to_string(),
                    page_title: Some("OK".to_string()),
                    meta_description: None,
                    content_type: "text/html".to_string(),
                    response_time_ms: 1,
                })
            }
        }

        fn kind(&self) -> EngineKind {
            EngineKind::Http
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            ..RetryPolicy::default()
        }
    }

    fn worker_with_engine(
        engine: Arc<dyn FetchEngine>,
    ) -> (ScrapeWorker, Arc<parking_lot::Mutex<Vec<ScrapingResult>>>) {
        let results = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let worker = ScrapeWorker::new(
            Arc::new(EngineRouter::new(vec![engine])),
            quick_policy(),
            Duration::from_secs(5),
            results.clone(),
            Arc::new(PoolStats::default()),
        );
        (worker, results)
    }

    #[tokio::test]
    async fn test_worker_publishes_success_after_transient_failures() {
        let engine = Arc::new(FlakyEngine {
            succeed_on: 2,
            calls: AtomicU64::new(0),
        });
        let (worker, results) = worker_with_engine(engine.clone());

        let queue = Arc::new(InMemoryTaskQueue::new());
        let task = ScrapingTask::new("http://example.com", Scenario::Custom);
        let task_id = task.id;
        queue.enqueue(task).await.unwrap();
        queue.close().await;

        worker.run(queue).await;

        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        assert_eq!(results[0].task_id, task_id);
        assert_eq!(results[0].attempts, 2);
        assert_eq!(results[0].data["title"], "OK");
    }

    #[tokio::test]
    async fn test_worker_publishes_failure_after_exhausted_retries() {
        let engine = Arc::new(FlakyEngine {
            succeed_on: u32::MAX,
            calls: AtomicU64::new(0),
        });
        let (worker, results) = worker_with_engine(engine.clone());

        let queue = Arc::new(InMemoryTaskQueue::new());
        let task = ScrapingTask::new("http://example.com", Scenario::Custom).with_max_retries(2);
        queue.enqueue(task).await.unwrap();
        queue.close().await;

        worker.run(queue).await;

        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_success());
        assert_eq!(results[0].attempts, 2);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert!(results[0].error.as_deref().unwrap().contains("503"));
    }
}
