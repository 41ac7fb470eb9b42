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

use crate::utils::retry_policy::RetryPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含协调器、重试、浏览器和WebDriver等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 协调器配置
    pub scraper: ScraperSettings,
    /// 重试配置
    pub retry: RetrySettings,
    /// 浏览器引擎配置
    pub browser: BrowserSettings,
    /// WebDriver引擎配置
    pub webdriver: WebDriverSettings,
}

/// 协调器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperSettings {
    /// 最大并行实例数
    pub max_instances: usize,
    /// 单次抓取超时时间（秒）
    pub fetch_timeout: u64,
}

/// 重试配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// 初始退避时间（秒）
    pub initial_backoff_secs: u64,
    /// 最大退避时间（秒）
    pub max_backoff_secs: u64,
    /// 退避乘数
    pub backoff_multiplier: f64,
}

impl RetrySettings {
    /// 转换为重试策略
    ///
    /// 最大尝试次数由任务自身的 `max_retries` 决定，此处只提供退避参数
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            backoff_multiplier: self.backoff_multiplier,
            ..RetryPolicy::default()
        }
    }
}

/// 浏览器引擎配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 远程Chrome调试地址（缺省时本地启动浏览器进程）
    pub remote_debugging_url: Option<String>,
}

/// WebDriver引擎配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WebDriverSettings {
    /// WebDriver服务端点 (chromedriver/geckodriver)
    pub endpoint: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("scraper.max_instances", 5)?
            .set_default("scraper.fetch_timeout", 30)?
            // Default backoff: ~1s, 2s, 4s... capped at 10s
            .set_default("retry.initial_backoff_secs", 1)?
            .set_default("retry.max_backoff_secs", 10)?
            .set_default("retry.backoff_multiplier", 2.0)?
            .set_default("webdriver.endpoint", "http://localhost:9515")?
            .set_default("browser.remote_debugging_url", None::<String>)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("SCRAPRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}
