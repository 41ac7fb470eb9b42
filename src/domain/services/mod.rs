// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块包含系统的核心业务逻辑服务：
/// - 提取服务（extraction_service）：按场景从原始页面内容提取结构化数据
pub mod extraction_service;
