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

use crate::domain::models::task::{EngineKind, ScrapingTask};
use crate::utils::retry_policy::Retryable;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 非成功HTTP状态码
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    /// 超时
    #[error("fetch timed out")]
    Timeout,
    /// URL无效
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// 不支持的协议
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    /// 浏览器错误
    #[error("browser error: {0}")]
    Browser(String),
    /// WebDriver协议错误
    #[error("webdriver error: {0}")]
    WebDriver(String),
    /// 会话不可用
    #[error("session unavailable: {0}")]
    SessionUnavailable(String),
    /// 没有可用的引擎
    #[error("no engine registered for '{0}'")]
    NoEngine(String),
}

impl EngineError {
    /// 判断错误是否可重试
    ///
    /// 瞬时失败（超时、连接中断、429/5xx、浏览器与会话故障）可重试；
    /// 永久失败（其他4xx、URL无效、协议不支持、引擎缺失）立即返回
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            EngineError::HttpStatus(status) => *status == 429 || (500..=599).contains(status),
            EngineError::Timeout => true,
            EngineError::Browser(_)
            | EngineError::WebDriver(_)
            | EngineError::SessionUnavailable(_) => true,
            EngineError::InvalidUrl(_)
            | EngineError::UnsupportedScheme(_)
            | EngineError::NoEngine(_) => false,
        }
    }
}

impl Retryable for EngineError {
    fn is_retryable(&self) -> bool {
        EngineError::is_retryable(self)
    }
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// 自定义请求头
    pub headers: HashMap<String, String>,
    /// 请求总超时时间
    pub timeout: Duration,
    /// 动态内容等待时间
    pub wait_time: Duration,
    /// 是否滚动到页面底部
    pub scroll_to_bottom: bool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: Duration::from_secs(30),
            wait_time: Duration::from_secs(5),
            scroll_to_bottom: false,
        }
    }

    /// 由任务构造抓取请求
    pub fn from_task(task: &ScrapingTask, timeout: Duration) -> Self {
        Self {
            url: task.url.clone(),
            headers: task.custom_headers.clone(),
            timeout,
            wait_time: Duration::from_millis(task.wait_time_ms),
            scroll_to_bottom: task.scroll_to_bottom,
        }
    }
}

/// 抓取响应
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP状态码（浏览器类引擎固定为200，失败的导航作为错误返回）
    pub status_code: u16,
    /// 原始页面内容
    pub content: String,
    /// 页面标题
    pub page_title: Option<String>,
    /// meta描述
    pub meta_description: Option<String>,
    /// 内容类型
    pub content_type: String,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

/// 抓取引擎特质
///
/// 每种引擎提供统一的"抓取一个页面并返回原始内容"能力，
/// 协调器只依赖该接口，由任务携带的标签选择具体实现
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// 抓取一个页面
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError>;

    /// 引擎类别标签
    fn kind(&self) -> EngineKind;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
