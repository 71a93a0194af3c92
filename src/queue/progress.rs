// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::job::JobProgress;
use crate::domain::repositories::job_repository::JobRepository;

/// 单次任务运行的进度发布者
///
/// 每个已结算的工作单元发布一次 `{processed, failed, total}`，计数只增不减
pub struct ProgressReporter {
    sender: watch::Sender<JobProgress>,
    current: JobProgress,
}

impl ProgressReporter {
    pub fn new(total_items: i32) -> Self {
        let current = JobProgress::new(total_items);
        let (sender, _) = watch::channel(current);
        Self { sender, current }
    }

    /// 新的观察者
    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.sender.subscribe()
    }

    /// 记录一个已结算的工作单元
    pub fn record(&mut self, succeeded: bool) -> JobProgress {
        self.current.processed_items += 1;
        if !succeeded {
            self.current.failed_items += 1;
        }
        self.sender.send_replace(self.current);
        self.current
    }

    /// 关闭通道，返回最终计数
    pub fn close(self) -> JobProgress {
        self.current
    }
}

/// 把最新的进度写入任务记录
///
/// 写入在独立任务中进行，处理下一个工作单元无需等待数据库；
/// 通道关闭后写入最后一次变化并退出。
pub fn spawn_progress_writer(
    jobs: Arc<dyn JobRepository>,
    job_id: Uuid,
    mut receiver: watch::Receiver<JobProgress>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let initial = *receiver.borrow_and_update();
        if let Err(e) = jobs.update_progress(job_id, initial).await {
            warn!(job_id = %job_id, "Failed to persist progress: {}", e);
        }
        while receiver.changed().await.is_ok() {
            let progress = *receiver.borrow_and_update();
            if let Err(e) = jobs.update_progress(job_id, progress).await {
                warn!(job_id = %job_id, "Failed to persist progress: {}", e);
            }
        }
    })
}
