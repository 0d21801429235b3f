use stockledger_infra::workers::SyncTrigger;
use stockledger_infra::AppConfig;

#[tokio::main]
async fn main() {
    stockledger_observability::init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let engine = match stockledger_api::app::services::build_engine(&config).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "failed to start reconciliation engine");
            std::process::exit(1);
        }
    };

    let trigger = SyncTrigger::spawn(engine.clone(), config.sync.interval);
    let app = stockledger_api::app::build_app(engine);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on {}", addr);
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await;

    trigger.shutdown().await;

    if let Err(e) = served {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
