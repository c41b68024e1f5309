//! Backend entry-point: loads settings, wires adapters, and runs the HTTP
//! server alongside the expiry monitor.

mod server;

use std::sync::Arc;

use actix_web::cookie::Key;
use actix_web::web;
use color_eyre::eyre::{Context, Result, eyre};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use isolation_backend::domain::IsolationRecordService;
use isolation_backend::domain::expiry_monitor::{
    ExpiryMonitor, ExpiryMonitorConfig, ExpiryMonitorPorts,
};
use isolation_backend::domain::ports::IsolationRecordRepository;
use isolation_backend::inbound::http::health::HealthState;
use isolation_backend::inbound::http::state::HttpState;
use isolation_backend::outbound::alerts::TracingAlertSink;
use isolation_backend::outbound::memory::InMemoryIsolationRecordRepository;
use isolation_backend::outbound::persistence::{
    DbPool, DieselIsolationRecordRepository, PoolConfig, run_pending_migrations,
};
use isolation_backend::settings::AppSettings;
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load settings: {err}"))?;

    let key = load_session_key(&settings)?;
    let repository = build_repository(&settings).await?;
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let service = Arc::new(IsolationRecordService::new(
        repository.clone(),
        clock.clone(),
    ));
    let http_state = web::Data::new(HttpState::new(service.clone(), service));

    let monitor_config = ExpiryMonitorConfig {
        interval: settings.monitor_interval(),
        dedup: settings.warning_dedup()?,
        scope: settings.monitor_scope()?,
    };
    let monitor = ExpiryMonitor::new(
        ExpiryMonitorPorts {
            records: repository,
            alerts: Arc::new(TracingAlertSink),
            clock,
        },
        monitor_config,
    )
    .spawn();

    let health_state = web::Data::new(HealthState::new());
    let config = ServerConfig::from_settings(&settings, key)?;
    let server = create_server(health_state.clone(), http_state, config)?;
    let handle = server.handle();
    health_state.mark_ready();

    let mut server = std::pin::pin!(server);
    let served = tokio::select! {
        result = &mut server => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
            health_state.mark_unhealthy();
            handle.stop(true).await;
            server.await
        }
    };

    health_state.mark_unhealthy();
    monitor.shutdown().await;
    served.wrap_err("http server failed")
}

fn load_session_key(settings: &AppSettings) -> Result<Key> {
    let key_path = settings.session_key_file();
    match std::fs::read(&key_path) {
        Ok(bytes) => Ok(Key::derive_from(&bytes)),
        Err(e) if cfg!(debug_assertions) || settings.session_allow_ephemeral() => {
            warn!(path = %key_path.display(), error = %e, "using temporary session key (dev only)");
            Ok(Key::generate())
        }
        Err(e) => Err(e).wrap_err_with(|| {
            format!("failed to read session key at {}", key_path.display())
        }),
    }
}

async fn build_repository(settings: &AppSettings) -> Result<Arc<dyn IsolationRecordRepository>> {
    let Some(database_url) = settings.database_url.as_deref() else {
        warn!("no database configured; isolation records are kept in memory");
        return Ok(Arc::new(InMemoryIsolationRecordRepository::new()));
    };

    run_pending_migrations(database_url)
        .await
        .wrap_err("failed to apply database migrations")?;
    let pool = DbPool::new(PoolConfig::new(database_url))
        .await
        .wrap_err("failed to build database pool")?;
    info!("using PostgreSQL isolation record repository");
    Ok(Arc::new(DieselIsolationRecordRepository::new(pool)))
}
