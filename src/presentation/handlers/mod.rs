// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// - 任务的创建、查询与取消（job_handler）
/// - 站点分析结果查询（site_handler）
pub mod job_handler;
pub mod site_handler;
