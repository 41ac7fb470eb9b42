// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 导出模块
//!
//! 将内存中的结果集合渲染为结构化记录格式（JSON/CSV）。
//! 导出是幂等的：同一结果集合重复导出产生字节相同的文件。

use crate::domain::models::result::ScrapingResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// 导出错误类型
#[derive(Error, Debug)]
pub enum ExportError {
    /// IO错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化错误
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV写入错误
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// 将结果集合写入JSON文件
///
/// UTF-8编码、带缩进的结果对象数组，`data` 以嵌套映射形式保留。
/// 覆盖已存在的文件。
pub fn write_json(path: &Path, results: &[ScrapingResult]) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}

/// 将结果集合写入CSV摘要文件
///
/// 每条结果一行，仅包含摘要列；`data` 不展开到CSV中。
/// 覆盖已存在的文件。
pub fn write_csv(path: &Path, results: &[ScrapingResult]) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["task_id", "url", "scenario", "status", "execution_time"])?;
    for result in results {
        writer.write_record([
            result.task_id.to_string(),
            result.url.clone(),
            result.scenario.to_string(),
            result.status.to_string(),
            format!("{:.3}", result.execution_time),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
