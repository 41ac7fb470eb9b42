// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::result::ScrapingResult;
use crate::domain::models::task::ScrapingTask;
use crate::engines::router::EngineRouter;
use crate::export;
use crate::queue::task_queue::{InMemoryTaskQueue, TaskQueue};
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::scrape_worker::{PoolStats, ScrapeWorker};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// 并行实例数硬上限
///
/// 超出上限是配置错误而不是静默钳制，便于调用方发现错误配置
pub const MAX_INSTANCES_HARD_CAP: usize = 10;

/// 协调器错误类型
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// 并行实例数配置无效
    #[error("invalid max_instances {0}: must be between 1 and {MAX_INSTANCES_HARD_CAP}")]
    InvalidMaxInstances(usize),
}

/// 健康状态快照
///
/// 供监控方轮询的时间点快照，运行中的任意时刻都可读取
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub active_instances: usize,
    pub max_instances: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub total_results: usize,
}

/// 抓取协调器
///
/// 拥有任务队列与结果集合，负责一次 `execute_multi_instance`
/// 调用内的多实例并行执行。由调用方显式构造并注入配置，
/// 不存在进程级共享实例。
pub struct ScraperCoordinator {
    max_instances: usize,
    fetch_timeout: Duration,
    retry_policy: RetryPolicy,
    router: Arc<EngineRouter>,
    /// 跨运行累积的结果集合，导出时渲染
    results: Arc<parking_lot::Mutex<Vec<ScrapingResult>>>,
    stats: Arc<PoolStats>,
}

impl ScraperCoordinator {
    /// 创建新的协调器实例
    ///
    /// # 参数
    ///
    /// * `settings` - 应用配置
    /// * `router` - 引擎路由器
    ///
    /// # 返回值
    ///
    /// * `Ok(ScraperCoordinator)` - 协调器实例
    /// * `Err(CoordinatorError)` - 池级配置无效
    pub fn new(settings: &Settings, router: Arc<EngineRouter>) -> Result<Self, CoordinatorError> {
        let max_instances = settings.scraper.max_instances;
        if max_instances == 0 || max_instances > MAX_INSTANCES_HARD_CAP {
            return Err(CoordinatorError::InvalidMaxInstances(max_instances));
        }

        Ok(Self {
            max_instances,
            fetch_timeout: Duration::from_secs(settings.scraper.fetch_timeout),
            retry_policy: settings.retry.to_policy(),
            router,
            results: Arc::new(parking_lot::Mutex::new(Vec::new())),
            stats: Arc::new(PoolStats::default()),
        })
    }

    /// 并行执行一批抓取任务
    ///
    /// 校验失败的任务立即产生失败结果，不进入队列；有效任务由
    /// `min(max_instances, 有效任务数)` 个工作器并行消费。返回值
    /// 对每个提交的任务恰好包含一条结果，顺序不保证与提交顺序一致。
    /// 单个任务的失败不会中止其他任务。
    pub async fn execute_multi_instance(
        &self,
        tasks: Vec<ScrapingTask>,
    ) -> Vec<ScrapingResult> {
        self.execute_internal(tasks, None).await
    }

    /// 带截止时间的并行执行
    ///
    /// 截止时间到达后，仍在排队的任务与执行中的任务都被标记为
    /// 超时失败结果，正在进行的抓取被中止；每任务一条结果的
    /// 不变式仍然成立
    pub async fn execute_with_deadline(
        &self,
        tasks: Vec<ScrapingTask>,
        deadline: Duration,
    ) -> Vec<ScrapingResult> {
        self.execute_internal(tasks, Some(deadline)).await
    }

    async fn execute_internal(
        &self,
        tasks: Vec<ScrapingTask>,
        deadline: Option<Duration>,
    ) -> Vec<ScrapingResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        info!(task_count = tasks.len(), "starting multi-instance execution");
        let started = Instant::now();

        let run_results: Arc<parking_lot::Mutex<Vec<ScrapingResult>>> =
            Arc::new(parking_lot::Mutex::new(Vec::with_capacity(tasks.len())));
        let queue = Arc::new(InMemoryTaskQueue::new());
        let mut valid_tasks: Vec<ScrapingTask> = Vec::new();

        for task in tasks {
            match task.validate() {
                Ok(()) => valid_tasks.push(task),
                Err(e) => {
                    warn!(task_id = %task.id, url = %task.url, error = %e, "task rejected at validation");
                    self.stats.task_failed();
                    run_results
                        .lock()
                        .push(ScrapingResult::failure(&task, e.to_string(), 0, 0.0));
                }
            }
        }

        for task in &valid_tasks {
            // the queue only rejects after close, which happens below
            let _ = queue.enqueue(task.clone()).await;
        }
        queue.close().await;

        if !valid_tasks.is_empty() {
            let worker_count = self.max_instances.min(valid_tasks.len());
            let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(worker_count);
            for _ in 0..worker_count {
                let worker = ScrapeWorker::new(
                    self.router.clone(),
                    self.retry_policy.clone(),
                    self.fetch_timeout,
                    run_results.clone(),
                    self.stats.clone(),
                );
                let queue = queue.clone();
                handles.push(tokio::spawn(async move {
                    worker.run(queue).await;
                }));
            }

            let drained = match deadline {
                Some(deadline) => {
                    tokio::time::timeout(
                        deadline,
                        futures::future::join_all(handles.iter_mut()),
                    )
                    .await
                    .is_ok()
                }
                None => {
                    futures::future::join_all(handles.iter_mut()).await;
                    true
                }
            };

            if !drained {
                warn!("deadline exceeded, aborting in-flight workers");
                for handle in &handles {
                    handle.abort();
                }
                // join the aborted workers so no further results can land
                futures::future::join_all(handles).await;
                self.stats.reset_active();

                self.mark_remaining_as_timed_out(&queue, &valid_tasks, &run_results, started)
                    .await;
            }
        }

        let run = std::mem::take(&mut *run_results.lock());
        self.results.lock().extend(run.iter().cloned());

        info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            results = run.len(),
            completed = self.stats.completed_tasks(),
            failed = self.stats.failed_tasks(),
            "multi-instance execution finished"
        );

        run
    }

    /// 截止时间到达后补齐缺失的结果
    async fn mark_remaining_as_timed_out(
        &self,
        queue: &Arc<InMemoryTaskQueue>,
        valid_tasks: &[ScrapingTask],
        run_results: &Arc<parking_lot::Mutex<Vec<ScrapingResult>>>,
        started: Instant,
    ) {
        let elapsed = started.elapsed().as_secs_f64();

        while let Some(task) = queue.try_dequeue().await {
            self.stats.task_failed();
            run_results.lock().push(ScrapingResult::failure(
                &task,
                "deadline exceeded before task started",
                0,
                elapsed,
            ));
        }

        let produced: HashSet<Uuid> = run_results.lock().iter().map(|r| r.task_id).collect();
        for task in valid_tasks {
            if !produced.contains(&task.id) {
                self.stats.task_failed();
                run_results.lock().push(ScrapingResult::failure(
                    task,
                    "deadline exceeded during fetch",
                    0,
                    elapsed,
                ));
            }
        }
    }

    /// 获取健康状态快照
    pub fn health_check(&self) -> HealthStatus {
        HealthStatus {
            active_instances: self.stats.active_workers(),
            max_instances: self.max_instances,
            completed_tasks: self.stats.completed_tasks(),
            failed_tasks: self.stats.failed_tasks(),
            total_results: self.results.lock().len(),
        }
    }

    /// 当前累积结果的拷贝
    pub fn results_snapshot(&self) -> Vec<ScrapingResult> {
        self.results.lock().clone()
    }

    /// 将累积结果导出为JSON文件
    pub fn export_results_to_json(&self, path: &Path) -> Result<(), export::ExportError> {
        let results = self.results.lock();
        export::write_json(path, &results)?;
        info!(path = %path.display(), results = results.len(), "results exported to JSON");
        Ok(())
    }

    /// 将累积结果导出为CSV文件
    pub fn export_results_to_csv(&self, path: &Path) -> Result<(), export::ExportError> {
        let results = self.results.lock();
        export::write_csv(path, &results)?;
        info!(path = %path.display(), results = results.len(), "results exported to CSV");
        Ok(())
    }
}
