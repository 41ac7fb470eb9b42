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

use crate::domain::models::task::{Scenario, ScrapingTask};
use crate::utils::url_utils;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// 提取错误类型
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// 响应内容不是可解析的文本
    #[error("unsupported content type '{0}': body is not extractable text")]
    UnsupportedContent(String),
}

/// 单个选择器提取值的上限
const MAX_FIELD_VALUES: usize = 20;
/// 自定义回退时截取的正文长度（字符）
const TEXT_CONTENT_LIMIT: usize = 5000;
/// 提取图片数量上限
const MAX_IMAGES: usize = 50;
/// 提取链接数量上限
const MAX_LINKS: usize = 100;

/// 场景内置提取规则
///
/// 先选容器，再在每个容器内取字段首个匹配；页面没有容器
/// 标记时退化为在整个文档上应用字段选择器
struct ScenarioRule {
    container: &'static str,
    fields: &'static [(&'static str, &'static str)],
    max_items: usize,
}

const ECOMMERCE_RULE: ScenarioRule = ScenarioRule {
    container: ".product, .product-item, [data-product-id]",
    fields: &[
        ("title", "h2, h3, .product-title, .product-name"),
        ("price", ".price, .product-price, [class*='price']"),
        ("rating", ".rating, .stars, [class*='rating']"),
    ],
    max_items: 50,
};

const NEWS_RULE: ScenarioRule = ScenarioRule {
    container: "article, .article, .post, [class*='article']",
    fields: &[
        ("headline", "h1, h2, .headline, .title"),
        ("score", ".score, .points, [class*='score']"),
    ],
    max_items: 30,
};

const JOBS_RULE: ScenarioRule = ScenarioRule {
    container: ".job, .job-card, [data-job-id]",
    fields: &[
        ("title", "h2, h3, .job-title"),
        ("company", ".company, .company-name"),
        ("salary", ".salary, [class*='salary']"),
    ],
    max_items: 50,
};

const FINANCIAL_RULE: ScenarioRule = ScenarioRule {
    container: "[data-symbol], .stock-row, tr",
    fields: &[
        ("symbol", ".symbol, [data-symbol]"),
        ("price", ".price, [data-field='regularMarketPrice']"),
        ("change", ".change, [data-field='regularMarketChange']"),
    ],
    max_items: 100,
};

/// 从HTML中解析页面标题与meta描述
pub fn page_metadata(html: &str) -> (Option<String>, Option<String>) {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").unwrap();
    let title = document
        .select(&title_selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());

    let meta_selector = Selector::parse("meta[name='description']").unwrap();
    let meta_description = document
        .select(&meta_selector)
        .next()
        .and_then(|e| e.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    (title, meta_description)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 提取服务
///
/// 负责按场景从原始页面内容中提取结构化数据。选择器无匹配只会
/// 产生空字段，不会使任务失败。
pub struct ExtractionService;

impl ExtractionService {
    /// 按任务场景提取结构化数据
    pub fn extract(
        content: &str,
        content_type: &str,
        task: &ScrapingTask,
    ) -> Result<Map<String, Value>, ExtractionError> {
        Self::ensure_text_content(content, content_type)?;

        let document = Html::parse_document(content);

        let mut data = if !task.selectors.is_empty() {
            Self::extract_with_selectors(&document, &task.selectors)
        } else {
            match Self::rule_for(task.scenario) {
                Some(rule) => Self::extract_with_rule(&document, rule),
                None => Self::extract_fallback(&document),
            }
        };

        if let Ok(base_url) = Url::parse(&task.url) {
            if task.extract_images {
                let images = Self::collect_refs(&document, "img[src]", "src", &base_url, MAX_IMAGES);
                data.insert("images".to_string(), Value::Array(images));
            }
            if task.extract_links {
                let links = Self::collect_refs(&document, "a[href]", "href", &base_url, MAX_LINKS);
                data.insert("links".to_string(), Value::Array(links));
            }
        }

        Ok(data)
    }

    fn rule_for(scenario: Scenario) -> Option<&'static ScenarioRule> {
        match scenario {
            Scenario::Ecommerce => Some(&ECOMMERCE_RULE),
            Scenario::News => Some(&NEWS_RULE),
            Scenario::Jobs => Some(&JOBS_RULE),
            Scenario::Financial => Some(&FINANCIAL_RULE),
            Scenario::Custom => None,
        }
    }

    fn ensure_text_content(content: &str, content_type: &str) -> Result<(), ExtractionError> {
        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();

        let texty = normalized.is_empty()
            || normalized.starts_with("text/")
            || normalized.ends_with("html")
            || normalized.ends_with("xml");

        if !texty || content.contains('\u{0}') {
            return Err(ExtractionError::UnsupportedContent(normalized));
        }

        Ok(())
    }

    /// 使用调用方提供的选择器提取，每个字段产出一个值列表
    fn extract_with_selectors(
        document: &Html,
        selectors: &HashMap<String, String>,
    ) -> Map<String, Value> {
        let mut data = Map::new();

        for (field, selector_str) in selectors {
            // Invalid selectors degrade to an empty field, same as no match
            let values = match Selector::parse(selector_str) {
                Ok(selector) => document
                    .select(&selector)
                    .take(MAX_FIELD_VALUES)
                    .map(element_text)
                    .filter(|v| !v.is_empty())
                    .map(Value::String)
                    .collect(),
                Err(_) => Vec::new(),
            };
            data.insert(field.clone(), Value::Array(values));
        }

        data
    }

    /// 使用场景内置规则提取
    fn extract_with_rule(document: &Html, rule: &ScenarioRule) -> Map<String, Value> {
        let container_selector = Selector::parse(rule.container).unwrap();
        let containers: Vec<_> = document
            .select(&container_selector)
            .take(rule.max_items)
            .collect();

        let mut data = Map::new();

        for (field, selector_str) in rule.fields {
            let selector = Selector::parse(selector_str).unwrap();
            let values: Vec<Value> = if containers.is_empty() {
                document
                    .select(&selector)
                    .take(rule.max_items)
                    .map(element_text)
                    .filter(|v| !v.is_empty())
                    .map(Value::String)
                    .collect()
            } else {
                containers
                    .iter()
                    .filter_map(|container| container.select(&selector).next())
                    .map(element_text)
                    .filter(|v| !v.is_empty())
                    .map(Value::String)
                    .collect()
            };
            data.insert(field.to_string(), Value::Array(values));
        }

        data
    }

    /// custom场景无选择器时的回退：标题、正文与meta描述
    fn extract_fallback(document: &Html) -> Map<String, Value> {
        let title_selector = Selector::parse("title").unwrap();
        let title = document
            .select(&title_selector)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let text_content: String = document
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(TEXT_CONTENT_LIMIT)
            .collect();

        let meta_selector = Selector::parse("meta[name='description']").unwrap();
        let meta_description = document
            .select(&meta_selector)
            .next()
            .and_then(|e| e.value().attr("content"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let mut data = Map::new();
        data.insert("title".to_string(), Value::String(title));
        data.insert("text_content".to_string(), Value::String(text_content));
        data.insert(
            "meta_description".to_string(),
            Value::String(meta_description),
        );
        data
    }

    fn collect_refs(
        document: &Html,
        selector_str: &str,
        attr: &str,
        base_url: &Url,
        limit: usize,
    ) -> Vec<Value> {
        let selector = Selector::parse(selector_str).unwrap();
        let refs = document
            .select(&selector)
            .filter_map(|e| e.value().attr(attr));

        url_utils::resolve_many(base_url, refs, limit)
            .into_iter()
            .map(Value::String)
            .collect()
    }
}
