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

use anyhow::Context;
use scraprs::config::settings::Settings;
use scraprs::domain::models::task::ScrapingTask;
use scraprs::engines::router::EngineRouter;
use scraprs::utils::telemetry;
use scraprs::workers::ScraperCoordinator;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 主函数
///
/// 应用程序入口点：读取任务文件，执行多实例抓取并导出结果
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting scraprs...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    // 3. Read the task file: a JSON array of task specifications
    let task_file = std::env::args()
        .nth(1)
        .context("usage: scraprs <tasks.json>")?;
    let raw = std::fs::read_to_string(&task_file)
        .with_context(|| format!("reading task file {}", task_file))?;
    let tasks: Vec<ScrapingTask> =
        serde_json::from_str(&raw).context("parsing task file")?;
    info!(tasks = tasks.len(), file = %task_file, "task file loaded");

    // 4. Initialize engines and coordinator
    let router = Arc::new(EngineRouter::with_default_engines(&settings));
    let coordinator = ScraperCoordinator::new(&settings, router)?;

    // 5. Execute and export
    let results = coordinator.execute_multi_instance(tasks).await;
    let succeeded = results.iter().filter(|r| r.is_success()).count();
    info!(
        total = results.len(),
        succeeded,
        failed = results.len() - succeeded,
        "execution finished"
    );

    coordinator.export_results_to_json(Path::new("scraping_results.json"))?;
    coordinator.export_results_to_csv(Path::new("scraping_results.csv"))?;

    let health = coordinator.health_check();
    info!(
        completed = health.completed_tasks,
        failed = health.failed_tasks,
        results = health.total_results,
        "final status"
    );

    Ok(())
}
