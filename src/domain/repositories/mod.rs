// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 任务仓库（job_repository）：任务的认领、进度与终态写入
/// - 站点仓库（site_repository）：站点查询与按域名写入
/// - 站点分析仓库（site_analysis_repository）：分析记录与最新记录查询
/// - 联系人仓库（contact_repository）：补全结果的替换写入
/// - 存储仓库（storage_repository）：报告文件的存储
pub mod contact_repository;
pub mod job_repository;
pub mod site_analysis_repository;
pub mod site_repository;
pub mod storage_repository;
