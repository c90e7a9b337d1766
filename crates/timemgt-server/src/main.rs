mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use timemgt_api::{AppStateInner, IdentityResolver, JwtAuth, RemoteAuth, SessionAuth};
use timemgt_parsup::ParamsPolicy;

use crate::config::{AuthStrategy, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timemgt=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = timemgt_db::Database::open(&config.db_path)?;

    // Identity strategy
    let (resolver, jwt): (Arc<dyn IdentityResolver>, Option<Arc<JwtAuth>>) = match &config.auth {
        AuthStrategy::Jwt { secret } => {
            let jwt = Arc::new(JwtAuth::new(secret));
            let resolver: Arc<dyn IdentityResolver> = jwt.clone();
            (resolver, Some(jwt))
        }
        AuthStrategy::Session {
            redis_url,
            key_prefix,
        } => {
            let client = redis::Client::open(redis_url.as_str())?;
            let session: Arc<dyn IdentityResolver> =
                Arc::new(SessionAuth::new(client, key_prefix.clone(), config.db_timeout));
            (session, None)
        }
        AuthStrategy::Remote { user_center_url } => {
            let remote: Arc<dyn IdentityResolver> =
                Arc::new(RemoteAuth::new(user_center_url, config.db_timeout)?);
            (remote, None)
        }
    };
    info!("Identity strategy: {}", resolver.name());

    let state = Arc::new(AppStateInner {
        db,
        resolver,
        jwt,
        policy: ParamsPolicy::default(),
        db_timeout: config.db_timeout,
    });

    let app = timemgt_api::routes(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("timemgt listening on {}", config.addr);

    // The grace period starts once the signal has been received.
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(());
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        res = &mut server => res??,
        _ = stop_rx => match tokio::time::timeout(config.shutdown_grace, &mut server).await {
            Ok(res) => res??,
            Err(_) => {
                warn!(
                    "In-flight requests still running after {:?}, exiting",
                    config.shutdown_grace
                );
                server.abort();
            }
        },
    }

    info!("Server stopped, database closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
