pub mod client;
pub mod config;
pub mod errors;
pub mod fanout;
pub mod metrics_defs;
pub mod protocol;
pub mod service;

#[cfg(test)]
mod testutils;

use client::UpstreamSearchClient;
use errors::SearchRouterError;
use fanout::FanOutAggregator;
use service::SearchRouterService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Runs the search listener and the admin listener until either one fails.
pub async fn run(config: config::Config) -> Result<(), SearchRouterError> {
    config.validate()?;
    shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);

    let client = UpstreamSearchClient::new(&config.upstream)?;
    let aggregator =
        FanOutAggregator::new(Arc::new(client)).with_task_timeout(config.fanout.task_timeout());
    tracing::info!(upstream = %config.upstream.url, "Search router starting");

    let router_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        SearchRouterService::new(aggregator),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, SearchRouterError>::new(|| true),
    );

    tokio::try_join!(router_task, admin_task)?;
    Ok(())
}
