// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 每种任务类型一个处理器，由 `queue::scheduler` 驱动：
/// 发现（discovery）、补全（enrichment）、分析（analysis）、报告（report）
pub mod analysis_worker;
pub mod discovery_worker;
pub mod enrichment_worker;
pub mod handler;
pub mod manager;
pub mod report_worker;

pub use handler::{ItemError, JobHandler};
pub use manager::WorkerManager;
