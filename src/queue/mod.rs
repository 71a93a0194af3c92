// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供任务服务、进度发布和按任务类型划分的调度器
pub mod job_queue;
pub mod progress;
pub mod scheduler;
