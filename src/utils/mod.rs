// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// - 日志初始化（telemetry）
/// - 站点 URL 规范化（url_utils）
/// - 版本号比较（version）
pub mod telemetry;
pub mod url_utils;
pub mod version;
