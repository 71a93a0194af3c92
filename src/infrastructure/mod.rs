// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，负责与数据库、文件系统和外部服务交互。
///
/// 包含的子模块：
/// - 数据库（database）：连接池和实体映射
/// - 指标（metrics）：Prometheus 导出器
/// - 仓库实现（repositories）：领域仓库接口的具体实现
/// - 外部服务（services）：联系人查找等第三方 API 客户端
/// - 存储（storage）：报告文件存储
pub mod database;
pub mod metrics;
pub mod repositories;
pub mod services;
pub mod storage;
