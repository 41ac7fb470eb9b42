// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Scenario, ScrapingTask};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// 任务执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failure,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Success => f.write_str("success"),
            TaskStatus::Failure => f.write_str("failure"),
        }
    }
}

/// 抓取结果
///
/// 每个提交的任务恰好对应一条结果。重试耗尽或校验失败的任务
/// 产生失败结果，错误信息保存在 `error` 字段中，绝不静默丢弃。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingResult {
    /// 关联的任务ID
    pub task_id: Uuid,
    /// 任务URL
    pub url: String,
    /// 任务场景
    pub scenario: Scenario,
    /// 执行状态
    pub status: TaskStatus,
    /// 执行耗时（秒）
    pub execution_time: f64,
    /// 实际执行的抓取尝试次数
    pub attempts: u32,
    /// 提取到的结构化数据
    pub data: Map<String, Value>,
    /// 失败原因（仅失败时存在）
    pub error: Option<String>,
    /// 结果生成时间
    pub timestamp: DateTime<Utc>,
}

impl ScrapingResult {
    /// 构造成功结果
    pub fn success(
        task: &ScrapingTask,
        data: Map<String, Value>,
        attempts: u32,
        execution_time: f64,
    ) -> Self {
        Self {
            task_id: task.id,
            url: task.url.clone(),
            scenario: task.scenario,
            status: TaskStatus::Success,
            execution_time,
            attempts,
            data,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// 构造失败结果
    pub fn failure(
        task: &ScrapingTask,
        error: impl Into<String>,
        attempts: u32,
        execution_time: f64,
    ) -> Self {
        Self {
            task_id: task.id,
            url: task.url.clone(),
            scenario: task.scenario,
            status: TaskStatus::Failure,
            execution_time,
            attempts,
            data: Map::new(),
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
