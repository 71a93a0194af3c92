// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use auditrs::config::settings::Settings;
use auditrs::domain::models::job::JobType;
use auditrs::domain::repositories::contact_repository::ContactRepository;
use auditrs::domain::repositories::job_repository::JobRepository;
use auditrs::domain::repositories::site_analysis_repository::SiteAnalysisRepository;
use auditrs::domain::repositories::site_repository::SiteRepository;
use auditrs::domain::repositories::storage_repository::StorageRepository;
use auditrs::domain::services::analysis_orchestrator::{
    AnalysisOrchestrator, ProbeSuite, ProbeTimeouts,
};
use auditrs::domain::services::report_service::{JsonReportRenderer, ReportService};
use auditrs::infrastructure::database::connection;
use auditrs::infrastructure::metrics::init_metrics;
use auditrs::infrastructure::repositories::contact_repo_impl::ContactRepositoryImpl;
use auditrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use auditrs::infrastructure::repositories::site_analysis_repo_impl::SiteAnalysisRepositoryImpl;
use auditrs::infrastructure::repositories::site_repo_impl::SiteRepositoryImpl;
use auditrs::infrastructure::services::hunter_client::HunterClient;
use auditrs::infrastructure::storage::LocalStorage;
use auditrs::presentation::routes;
use auditrs::probes::availability::AvailabilityProbe;
use auditrs::probes::http::build_client;
use auditrs::probes::pagespeed::PageSpeedProbe;
use auditrs::probes::security_headers::SecurityHeadersProbe;
use auditrs::probes::tls::TlsProbe;
use auditrs::probes::vulnerabilities::WpVulnerabilityClient;
use auditrs::probes::wordpress::{StableCheckFeed, WordPressProbe};
use auditrs::queue::job_queue::JobService;
use auditrs::queue::scheduler::{JobScheduler, Scheduler, SchedulerOptions};
use auditrs::utils::telemetry;
use auditrs::workers::analysis_worker::AnalysisHandler;
use auditrs::workers::discovery_worker::DiscoveryHandler;
use auditrs::workers::enrichment_worker::EnrichmentHandler;
use auditrs::workers::manager::WorkerManager;
use auditrs::workers::report_worker::ReportHandler;
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting auditrs...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    init_metrics(&settings.metrics);

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Repositories and storage
    let jobs: Arc<dyn JobRepository> = Arc::new(JobRepositoryImpl::new(db.clone()));
    let sites: Arc<dyn SiteRepository> = Arc::new(SiteRepositoryImpl::new(db.clone()));
    let analyses: Arc<dyn SiteAnalysisRepository> =
        Arc::new(SiteAnalysisRepositoryImpl::new(db.clone()));
    let contacts: Arc<dyn ContactRepository> = Arc::new(ContactRepositoryImpl::new(db.clone()));
    let storage: Arc<dyn StorageRepository> =
        Arc::new(LocalStorage::from_settings(&settings.storage));

    // 5. Probes
    let client = build_client(&settings.probes.user_agent, settings.probes.http_timeout())?;
    let external_client = build_client(
        &settings.probes.user_agent,
        settings.probes.pagespeed_timeout(),
    )?;
    let stable_check = Arc::new(StableCheckFeed::new(
        client.clone(),
        &settings.wordpress.api_base_url,
    ));
    let probes = ProbeSuite {
        availability: Arc::new(AvailabilityProbe::new(
            client.clone(),
            settings.probes.http_timeout(),
        )),
        security_headers: Arc::new(SecurityHeadersProbe::new(client.clone())),
        pagespeed: Arc::new(PageSpeedProbe::new(
            external_client,
            settings.pagespeed.clone(),
        )),
        tls: Arc::new(TlsProbe::new(settings.probes.tls_timeout())),
        wordpress: Arc::new(WordPressProbe::new(client.clone(), stable_check)),
        vulnerabilities: Arc::new(WpVulnerabilityClient::new(
            client.clone(),
            &settings.wordpress.vulnerability_base_url,
            settings.wordpress.requests_per_minute,
        )),
    };
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        sites.clone(),
        analyses.clone(),
        probes,
        ProbeTimeouts::from(&settings.probes),
    ));
    let reports = Arc::new(ReportService::new(
        sites.clone(),
        analyses.clone(),
        storage,
        Arc::new(JsonReportRenderer),
    ));
    let hunter = Arc::new(HunterClient::new(client.clone(), &settings.hunter));

    // 6. One scheduler per job type
    let options = |job_type| SchedulerOptions::from_settings(&settings.scheduler, job_type);
    let schedulers: Vec<Arc<dyn Scheduler>> = vec![
        Arc::new(JobScheduler::new(
            Arc::new(DiscoveryHandler::new(client.clone(), sites.clone())),
            jobs.clone(),
            options(JobType::Discovery),
        )),
        Arc::new(JobScheduler::new(
            Arc::new(EnrichmentHandler::new(sites.clone(), contacts, hunter)),
            jobs.clone(),
            options(JobType::Enrichment),
        )),
        Arc::new(JobScheduler::new(
            Arc::new(AnalysisHandler::new(orchestrator)),
            jobs.clone(),
            options(JobType::Analysis),
        )),
        Arc::new(JobScheduler::new(
            Arc::new(ReportHandler::new(reports)),
            jobs.clone(),
            options(JobType::Report),
        )),
    ];

    let job_service = Arc::new(JobService::new(jobs, schedulers.clone()));
    let mut manager = WorkerManager::new(schedulers);
    manager.start().await?;
    let shutdown = manager.shutdown_token();

    // 7. HTTP server
    let app = routes::routes(job_service, analyses);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    manager.wait_for_shutdown().await;
    server.await??;

    info!("auditrs stopped");
    Ok(())
}
