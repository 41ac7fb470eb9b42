// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::EngineKind;
use crate::domain::services::extraction_service::page_metadata;
use crate::engines::traits::{EngineError, FetchEngine, FetchRequest, FetchResponse};
use crate::engines::validators;
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// 滚动加载的最大迭代次数
const MAX_SCROLL_ITERATIONS: u32 = 5;
/// 每次滚动后的等待时间
const SCROLL_PAUSE: Duration = Duration::from_secs(1);

fn browser_err(e: impl ToString) -> EngineError {
    EngineError::Browser(e.to_string())
}

/// 无头浏览器引擎
///
/// 基于chromiumoxide实现的浏览器自动化抓取引擎，适合JS渲染的页面。
/// 每次抓取独占一个浏览器实例：实例由执行该任务的工作器创建，
/// 不跨任务共享，并在所有退出路径（成功、失败、超时）上释放。
pub struct BrowserEngine {
    /// 远程Chrome调试地址；缺省时本地启动浏览器进程
    remote_debugging_url: Option<String>,
}

impl BrowserEngine {
    pub fn new() -> Self {
        Self {
            remote_debugging_url: None,
        }
    }

    pub fn with_remote_debugging_url(url: impl Into<String>) -> Self {
        Self {
            remote_debugging_url: Some(url.into()),
        }
    }

    async fn launch(&self, timeout: Duration) -> Result<(Browser, JoinHandle<()>), EngineError> {
        let (browser, mut handler) = if let Some(url) = &self.remote_debugging_url {
            Browser::connect(url).await.map_err(browser_err)?
        } else {
            let config = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(timeout)
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .build()
                .map_err(EngineError::Browser)?;

            Browser::launch(config).await.map_err(browser_err)?
        };

        // Drive browser events until the connection drops
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok((browser, events))
    }

    async fn fetch_page(
        &self,
        browser: &Browser,
        request: &FetchRequest,
    ) -> Result<FetchResponse, EngineError> {
        let start = Instant::now();

        let page = browser
            .new_page(request.url.as_str())
            .await
            .map_err(browser_err)?;

        // Load event or the request timeout, whichever comes first
        page.wait_for_navigation().await.map_err(browser_err)?;

        // Let dynamic content settle
        tokio::time::sleep(request.wait_time).await;

        if request.scroll_to_bottom {
            Self::scroll_to_bottom(&page).await?;
        }

        let page_title = page
            .get_title()
            .await
            .map_err(browser_err)?
            .filter(|t| !t.is_empty());
        let content = page.content().await.map_err(browser_err)?;
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

    /// 分步滚动到页面底部以触发懒加载内容
    ///
    /// 每轮滚动后等待一拍，页面高度不再增长时提前结束
    async fn scroll_to_bottom(page: &Page) -> Result<(), EngineError> {
        let mut previous_height: i64 = page
            .evaluate("document.body.scrollHeight")
            .await
            .map_err(browser_err)?
            .into_value()
            .unwrap_or(0);

        for _ in 0..MAX_SCROLL_ITERATIONS {
            page.evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await
                .map_err(browser_err)?;
            tokio::time::sleep(SCROLL_PAUSE).await;

            let height: i64 = page
                .evaluate("document.body.scrollHeight")
                .await
                .map_err(browser_err)?
                .into_value()
                .unwrap_or(0);

            if height == previous_height {
                break;
            }
            previous_height = height;
        }

        Ok(())
    }
}

impl Default for BrowserEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchEngine for BrowserEngine {
    /// 执行浏览器自动化抓取
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

        let (mut browser, events) = self.launch(request.timeout).await?;

        let outcome =
            tokio::time::timeout(request.timeout, self.fetch_page(&browser, request)).await;

        // Release the browser on every path; a leaked Chrome process would
        // degrade the whole pool over a long run
        let _ = browser.close().await;
        events.abort();

        match outcome {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout),
        }
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Browser
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
