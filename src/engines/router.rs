// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::task::{EngineKind, Scenario};
use crate::engines::browser_engine::BrowserEngine;
use crate::engines::reqwest_engine::ReqwestEngine;
use crate::engines::traits::{EngineError, FetchEngine, FetchRequest, FetchResponse};
use crate::engines::webdriver_engine::WebDriverEngine;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 引擎路由器
///
/// 按任务携带的引擎标签将抓取请求分发到具体引擎；
/// 任务未指定引擎时按场景选择默认引擎。协调器只依赖
/// `FetchEngine` 接口，新增引擎只需注册一个实现。
pub struct EngineRouter {
    /// 按类别注册的引擎，同类别后注册者覆盖先注册者
    engines: HashMap<EngineKind, Arc<dyn FetchEngine>>,
}

impl EngineRouter {
    /// 创建新的引擎路由器
    ///
    /// # 参数
    ///
    /// * `engines` - 引擎列表
    pub fn new(engines: Vec<Arc<dyn FetchEngine>>) -> Self {
        let mut map = HashMap::new();
        for engine in engines {
            map.insert(engine.kind(), engine);
        }
        Self { engines: map }
    }

    /// 按配置构造三种标准引擎的路由器
    pub fn with_default_engines(settings: &Settings) -> Self {
        let browser = match &settings.browser.remote_debugging_url {
            Some(url) => BrowserEngine::with_remote_debugging_url(url.clone()),
            None => BrowserEngine::new(),
        };

        Self::new(vec![
            Arc::new(ReqwestEngine::new()),
            Arc::new(browser),
            Arc::new(WebDriverEngine::new(settings.webdriver.endpoint.clone())),
        ])
    }

    /// 场景默认引擎
    ///
    /// JS密集的列表页走浏览器，其余走最轻量的HTTP引擎
    pub fn default_engine_for(scenario: Scenario) -> EngineKind {
        match scenario {
            Scenario::Ecommerce | Scenario::Jobs | Scenario::Financial => EngineKind::Browser,
            Scenario::News | Scenario::Custom => EngineKind::Http,
        }
    }

    /// 解析任务的有效引擎
    pub fn resolve(requested: Option<EngineKind>, scenario: Scenario) -> EngineKind {
        requested.unwrap_or_else(|| Self::default_engine_for(scenario))
    }

    /// 获取指定类别的引擎
    pub fn engine(&self, kind: EngineKind) -> Option<Arc<dyn FetchEngine>> {
        self.engines.get(&kind).cloned()
    }

    /// 将抓取请求分发到任务的有效引擎
    ///
    /// # 参数
    ///
    /// * `requested` - 任务指定的引擎，缺省时按场景选择
    /// * `scenario` - 任务场景
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 抓取响应
    /// * `Err(EngineError)` - 抓取过程中出现的错误
    pub async fn dispatch(
        &self,
        requested: Option<EngineKind>,
        scenario: Scenario,
        request: &FetchRequest,
    ) -> Result<FetchResponse, EngineError> {
        let kind = Self::resolve(requested, scenario);
        let engine = self
            .engine(kind)
            .ok_or_else(|| EngineError::NoEngine(kind.to_string()))?;

        debug!(engine = engine.name(), url = %request.url, "dispatching fetch");
        engine.fetch(request).await
    }
}
