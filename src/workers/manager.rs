// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::queue::scheduler::{Scheduler, SchedulerError};

/// 工作管理器
///
/// 为每种任务类型启动一个轮询调度器，并在关闭信号到达时统一停止
pub struct WorkerManager {
    schedulers: Vec<Arc<dyn Scheduler>>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(schedulers: Vec<Arc<dyn Scheduler>>) -> Self {
        Self {
            schedulers,
            shutdown: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// 关闭令牌，供 HTTP 服务等共享同一个关闭信号
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 启动全部调度器
    ///
    /// 启动前先把上次进程遗留的 running 任务标记为失败
    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        for scheduler in &self.schedulers {
            scheduler.recover_interrupted().await?;
        }
        for scheduler in &self.schedulers {
            let handle = Arc::clone(scheduler).spawn(self.shutdown.child_token());
            self.handles.push(handle);
        }
        info!("Started {} schedulers", self.handles.len());
        Ok(())
    }

    /// 等待关闭信号并停止调度器
    pub async fn wait_for_shutdown(&mut self) {
        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(err) => error!("Unable to listen for shutdown signal: {}", err),
            },
            _ = self.shutdown.cancelled() => {}
        }
        self.stop().await;
    }

    /// 停止调度器并等待轮询循环退出
    pub async fn stop(&mut self) {
        info!("Shutting down schedulers...");
        self.shutdown.cancel();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }
        info!("Schedulers shut down successfully");
    }
}
