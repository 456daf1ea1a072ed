use std::{net::SocketAddr, sync::Arc};

use mintboard::{
    backend_config_from_env, dashboard_router, init_logging, log_app_bind, log_app_start,
    log_backend_selected, logging_config_from_env, schedule_config_from_env, Backend,
    ReqwestBackend, SchedulePage, SearchPage,
};

// The blocking reqwest client owns its own runtime, so it is built and finally
// dropped outside the tokio runtime that serves the dashboard.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let addr: SocketAddr = std::env::var("MINTBOARD_DASHBOARD_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;
    let search_text = std::env::var("MINTBOARD_SEARCH_TEXT").unwrap_or_default();

    let backend_cfg = backend_config_from_env();
    let schedule_cfg = schedule_config_from_env();
    let backend: Arc<dyn Backend> = Arc::new(ReqwestBackend::new(&backend_cfg)?);
    log_backend_selected(
        &backend_cfg.base_url,
        backend_cfg.timeout_ms,
        schedule_cfg.tick_interval_ms,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let served = runtime.block_on(async {
        let schedule = Arc::new(SchedulePage::mount(Arc::clone(&backend), schedule_cfg));
        let search = Arc::new(SearchPage::mount(Arc::clone(&backend), search_text));
        let app = dashboard_router(schedule, search);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        log_app_bind(bound_addr);
        axum::serve(listener, app).await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    });

    runtime.shutdown_background();
    drop(backend);
    served
}
