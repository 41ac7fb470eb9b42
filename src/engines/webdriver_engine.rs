// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::EngineKind;
use crate::domain::services::extraction_service::page_metadata;
use crate::engines::traits::{EngineError, FetchEngine, FetchRequest, FetchResponse};
use crate::engines::validators;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// 滚动加载的最大迭代次数
const MAX_SCROLL_ITERATIONS: u32 = 5;
/// 每次滚动后的等待时间
const SCROLL_PAUSE: Duration = Duration::from_secs(1);

const SCROLL_HEIGHT_SCRIPT: &str = "return document.body.scrollHeight;";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";
const SNAPSHOT_SCRIPT: &str = r#"
    return {
        title: document.title || "",
        html: document.documentElement ? document.documentElement.outerHTML : ""
    };
"#;

/// WebDriver引擎
///
/// 通过W3C WebDriver协议驱动chromedriver/geckodriver等驱动服务。
/// 每次抓取创建一个独立会话，并在所有退出路径上删除会话。
pub struct WebDriverEngine {
    /// WebDriver服务端点
    endpoint: String,
}

impl WebDriverEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    fn session_endpoint(&self, rest: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), rest)
    }

    /// 检查WebDriver响应体中的协议级错误
    fn check_protocol_error(value: &Value) -> Result<(), EngineError> {
        if let Some(err) = value.pointer("/value/error").and_then(|v| v.as_str()) {
            let message = value
                .pointer("/value/message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown webdriver error");
            return Err(EngineError::WebDriver(format!("{}: {}", err, message)));
        }
        Ok(())
    }

    async fn create_session(&self, client: &reqwest::Client) -> Result<String, EngineError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--headless=new", "--no-sandbox", "--disable-gpu"]
                    }
                }
            }
        });

        let response = client
            .post(self.session_endpoint("/session"))
            .json(&capabilities)
            .send()
            .await
            .map_err(|e| EngineError::SessionUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::SessionUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(EngineError::SessionUnavailable(format!(
                "session create HTTP {}",
                status.as_u16()
            )));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| EngineError::SessionUnavailable(format!("session create parse: {}", e)))?;
        Self::check_protocol_error(&value)?;

        value
            .pointer("/value/sessionId")
            .and_then(|v| v.as_str())
            .or_else(|| value.pointer("/sessionId").and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .ok_or_else(|| {
                EngineError::SessionUnavailable("session create response missing sessionId".into())
            })
    }

    async fn navigate(
        &self,
        client: &reqwest::Client,
        session_id: &str,
        url: &str,
    ) -> Result<(), EngineError> {
        let response = client
            .post(self.session_endpoint(&format!("/session/{}/url", session_id)))
            .json(&json!({ "url": url }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EngineError::WebDriver(format!(
                "navigate HTTP {}",
                status.as_u16()
            )));
        }

        let value: Value = serde_json::from_str(&body).unwrap_or_default();
        Self::check_protocol_error(&value)
    }

    async fn execute(
        &self,
        client: &reqwest::Client,
        session_id: &str,
        script: &str,
    ) -> Result<Value, EngineError> {
        let response = client
            .post(self.session_endpoint(&format!("/session/{}/execute/sync", session_id)))
            .json(&json!({ "script": script, "args": [] }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EngineError::WebDriver(format!(
                "execute script HTTP {}",
                status.as_u16()
            )));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| EngineError::WebDriver(format!("execute parse: {}", e)))?;
        Self::check_protocol_error(&value)?;

        Ok(value.pointer("/value").cloned().unwrap_or(Value::Null))
    }

    async fn delete_session(&self, client: &reqwest::Client, session_id: &str) {
        let _ = client
            .delete(self.session_endpoint(&format!("/session/{}", session_id)))
            .send()
            .await;
    }

    async fn scroll_to_bottom(
        &self,
        client: &reqwest::Client,
        session_id: &str,
    ) -> Result<(), EngineError> {
        let mut previous_height = self
            .execute(client, session_id, SCROLL_HEIGHT_SCRIPT)
            .await?
            .as_i64()
            .unwrap_or(0);

        for _ in 0..MAX_SCROLL_ITERATIONS {
            self.execute(client, session_id, SCROLL_TO_BOTTOM_SCRIPT)
                .await?;
            tokio::time::sleep(SCROLL_PAUSE).await;

            let height = self
                .execute(client, session_id, SCROLL_HEIGHT_SCRIPT)
                .await?
                .as_i64()
                .unwrap_or(0);

            if height == previous_height {
                break;
            }
            previous_height = height;
        }

        Ok(())
    }

    async fn fetch_session(
        &self,
        client: &reqwest::Client,
        session_id: &str,
        request: &FetchRequest,
    ) -> Result<FetchResponse, EngineError> {
        let start = Instant::now();

        self.navigate(client, session_id, &request.url).await?;

        // Let dynamic content settle
        tokio::time::sleep(request.wait_time).await;

        if request.scroll_to_bottom {
            self.scroll_to_bottom(client, session_id).await?;
        }

        let snapshot = self.execute(client, session_id, SNAPSHOT_SCRIPT).await?;
        let content = snapshot
            .pointer("/html")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if content.is_empty() {
            return Err(EngineError::WebDriver("empty rendered snapshot".into()));
        }

        let page_title = snapshot
            .pointer("/title")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .filter(|t| !t.is_empty());
        let (_, meta_description) = page_metadata(&content);

        Ok(FetchResponse {
            status_code: 200,
            content,
            page_title,
            meta_description,
            content_type: "text/html".to_string(),
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl FetchEngine for WebDriverEngine {
    /// 通过WebDriver会话执行抓取
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
        validators::checked_url(&request.url)?;

        let client = reqwest::Client::builder()
            .timeout(request.timeout)
            .build()?;

        let session_id = self.create_session(&client).await?;

        let outcome = tokio::time::timeout(
            request.timeout,
            self.fetch_session(&client, &session_id, request),
        )
        .await;

        // The session is deleted on every path, including timeout
        self.delete_session(&client, &session_id).await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout),
        }
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Webdriver
    }

    fn name(&self) -> &'static str {
        "webdriver"
    }
}
