// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 分析编排（analysis_orchestrator）：并发运行探针、评分并持久化
/// - 联系人查找（contact_finder）：补全任务使用的外部服务接口
/// - 报告服务（report_service）：渲染并保存审计报告
/// - 评分引擎（scoring_engine）：把探针结果归约为健康分，纯函数
pub mod analysis_orchestrator;
pub mod contact_finder;
pub mod report_service;
pub mod scoring_engine;
