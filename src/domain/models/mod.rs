// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 任务（job）：一个异步执行的工作单元及其配置
/// - 站点（site）：被审计的网站
/// - 站点分析（site_analysis）：一次审计的原始数据与评分
/// - 探针结果（probe）：各探针的类型化结果与缺失槽位
/// - 评分（score）：子分、扣分日志与分类
/// - 联系人（contact）：补全任务写入的联系人
pub mod contact;
pub mod job;
pub mod probe;
pub mod score;
pub mod site;
pub mod site_analysis;
