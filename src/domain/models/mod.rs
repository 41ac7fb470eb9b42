// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 抓取任务（task）：一次 fetch + extract 执行单元
/// - 抓取结果（result）：每个任务恰好对应一条结果
pub mod result;
pub mod task;
