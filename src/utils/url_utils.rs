// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 判断URL是否为可抓取的web地址
pub fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// 将一组可能为相对路径的引用解析为绝对URL
///
/// 非 http/https 结果（mailto:、javascript: 等）被丢弃，数量以 `limit` 为上限
pub fn resolve_many<'a, I>(base_url: &Url, refs: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    refs.into_iter()
        .filter_map(|r| resolve_url(base_url, r).ok())
        .filter(is_web_url)
        .map(|u| u.to_string())
        .take(limit)
        .collect()
}
