// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// 任务校验错误类型
#[derive(Error, Debug)]
pub enum ValidationError {
    /// URL为空
    #[error("URL must not be empty")]
    EmptyUrl,

    /// URL格式无效
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// 不支持的协议
    #[error("unsupported URL scheme '{0}': only http and https are allowed")]
    UnsupportedScheme(String),
}

/// 抓取场景类型
///
/// 场景决定内置提取规则集，未指定引擎时也决定默认引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Ecommerce,
    News,
    Jobs,
    Financial,
    Custom,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Ecommerce => "ecommerce",
            Scenario::News => "news",
            Scenario::Jobs => "jobs",
            Scenario::Financial => "financial",
            Scenario::Custom => "custom",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 抓取引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// 无头浏览器 (chromiumoxide)
    Browser,
    /// WebDriver协议 (chromedriver/geckodriver)
    Webdriver,
    /// 纯HTTP请求 (reqwest)
    Http,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Browser => "browser",
            EngineKind::Webdriver => "webdriver",
            EngineKind::Http => "http",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_wait_time_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

/// 抓取任务
///
/// 一次 fetch + extract 执行单元。任务ID在构造时分配，
/// 同一URL可以出现在多个任务中，结果通过ID关联。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingTask {
    /// 任务ID
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// 目标URL
    pub url: String,
    /// 抓取场景
    pub scenario: Scenario,
    /// 指定引擎（缺省时按场景选择默认引擎）
    #[serde(default)]
    pub engine: Option<EngineKind>,
    /// 字段名到CSS选择器的映射；为空时使用场景内置规则
    #[serde(default)]
    pub selectors: HashMap<String, String>,
    /// 动态内容等待时间（毫秒）
    #[serde(default = "default_wait_time_ms")]
    pub wait_time_ms: u64,
    /// 最大抓取尝试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 是否滚动到页面底部以触发懒加载内容
    #[serde(default)]
    pub scroll_to_bottom: bool,
    /// 是否提取页面图片
    #[serde(default)]
    pub extract_images: bool,
    /// 是否提取页面链接
    #[serde(default)]
    pub extract_links: bool,
    /// 自定义请求头（仅HTTP引擎使用）
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
}

impl ScrapingTask {
    /// 创建新的抓取任务
    pub fn new(url: impl Into<String>, scenario: Scenario) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            scenario,
            engine: None,
            selectors: HashMap::new(),
            wait_time_ms: default_wait_time_ms(),
            max_retries: default_max_retries(),
            scroll_to_bottom: false,
            extract_images: false,
            extract_links: false,
            custom_headers: HashMap::new(),
        }
    }

    /// 指定抓取引擎
    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = Some(engine);
        self
    }

    /// 指定自定义选择器
    pub fn with_selectors(mut self, selectors: HashMap<String, String>) -> Self {
        self.selectors = selectors;
        self
    }

    /// 指定最大尝试次数
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 校验任务输入
    ///
    /// 校验失败的任务立即产生失败结果，不进入队列，也不触发任何网络请求
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::EmptyUrl);
        }

        let parsed = Url::parse(&self.url).map_err(|e| ValidationError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }
}
