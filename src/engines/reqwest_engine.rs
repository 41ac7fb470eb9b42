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

use crate::domain::models::task::EngineKind;
use crate::domain::services::extraction_service::page_metadata;
use crate::engines::traits::{EngineError, FetchEngine, FetchRequest, FetchResponse};
use crate::engines::validators;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// 轮换使用的请求头配置
struct HeaderProfile {
    user_agent: &'static str,
    accept: &'static str,
    accept_language: &'static str,
}

static HEADER_PROFILES: [HeaderProfile; 3] = [
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9",
    },
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.8",
    },
    HeaderProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-GB,en;q=0.7",
    },
];

/// HTTP抓取引擎
///
/// 基于reqwest实现的纯HTTP抓取引擎，适合静态内容。
/// 请求头在一个小配置池中轮换，任务自定义请求头优先。
/// 状态码只做瞬时/永久分类，重试完全交给任务层的重试策略。
pub struct ReqwestEngine {
    profile_index: AtomicUsize,
}

impl ReqwestEngine {
    pub fn new() -> Self {
        Self {
            profile_index: AtomicUsize::new(0),
        }
    }

    fn next_profile(&self) -> &'static HeaderProfile {
        let index = self.profile_index.fetch_add(1, Ordering::Relaxed);
        &HEADER_PROFILES[index % HEADER_PROFILES.len()]
    }
}

impl Default for ReqwestEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchEngine for ReqwestEngine {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 抓取响应
    /// * `Err(EngineError)` - 抓取过程中出现的错误
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        let url = validators::checked_url(&request.url)?;

        let profile = self.next_profile();

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(profile.accept),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(profile.accept_language),
        );
        // Task headers win over the rotated profile
        for (k, v) in &request.headers {
            if let (Ok(k), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(k, v);
            }
        }

        // Each request gets a fresh client for cookie isolation
        let client = reqwest::Client::builder()
            .user_agent(profile.user_agent)
            .timeout(request.timeout)
            .cookie_store(true)
            .build()?;

        let start = Instant::now();
        let response = client.get(url).headers(headers).send().await?;

        let status = response.status();
        let status_code = status.as_u16();

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        // Ensure content_type is not empty
        let content_type = if content_type.trim().is_empty() {
            "text/html".to_string()
        } else {
            content_type
        };

        if !status.is_success() {
            return Err(EngineError::HttpStatus(status_code));
        }

        let content = response.text().await?;
        let (page_title, meta_description) = page_metadata(&content);

        Ok(FetchResponse {
            status_code,
            content,
            page_title,
            meta_description,
            content_type,
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Http
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
