// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::config::settings::MetricsSettings;

pub const JOBS_CLAIMED: &str = "auditrs_jobs_claimed_total";
pub const JOBS_FINISHED: &str = "auditrs_jobs_finished_total";
pub const ITEMS_PROCESSED: &str = "auditrs_items_processed_total";
pub const ITEMS_FAILED: &str = "auditrs_items_failed_total";
pub const ITEM_RETRIES: &str = "auditrs_item_rate_limit_retries_total";
pub const JOB_DURATION: &str = "auditrs_job_duration_seconds";

/// 安装 Prometheus 导出器并注册指标描述
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", settings.address, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_counter!(JOBS_CLAIMED, "Jobs claimed by a scheduler, by job type");
    describe_counter!(
        JOBS_FINISHED,
        "Jobs that reached a terminal status, by job type and status"
    );
    describe_counter!(ITEMS_PROCESSED, "Work items settled, by job type");
    describe_counter!(ITEMS_FAILED, "Work items that ended in an error, by job type");
    describe_counter!(ITEM_RETRIES, "Work items retried after an upstream 429");
    describe_histogram!(JOB_DURATION, "Wall-clock duration of a job run in seconds");

    info!("Metrics exporter listening on {}", addr);
}
