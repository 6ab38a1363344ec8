use dotenvy::dotenv;
use redis::Client;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info, warn};

use pickleball_notify::auth::permission::StaticPermissions;
use pickleball_notify::config::AppConfig;
use pickleball_notify::db;
use pickleball_notify::feed::ChangeFeed;
use pickleball_notify::member::service::StoreMemberDirectory;
use pickleball_notify::notification::retention::spawn_purge_job;
use pickleball_notify::routes::{self, Services};
use pickleball_notify::store::memory::MemoryStore;
use pickleball_notify::store::postgres::PgDocumentStore;
use pickleball_notify::store::DocumentStore;

const MAX_BIND_ATTEMPTS: u16 = 5;

/// Change feed, relayed through Redis when configured and reachable.
async fn build_feed(redis_url: Option<&str>) -> ChangeFeed {
    let Some(url) = redis_url else {
        info!("No Redis URL configured, change feed stays local");
        return ChangeFeed::local();
    };

    info!("Initializing Redis change feed with URL: {}", url);
    let client = match Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            error!("Invalid Redis URL: {}", e);
            return ChangeFeed::local();
        }
    };

    match ChangeFeed::with_redis(client).await {
        Ok(feed) => feed,
        Err(e) => {
            warn!("Failed to connect to Redis, change feed stays local: {}", e);
            ChangeFeed::local()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    tracing_subscriber::fmt::init();

    // Load .env file if it exists
    dotenv().ok();

    let config = AppConfig::from_env()?;

    let feed = build_feed(config.redis_url.as_deref()).await;
    if feed.spawn_bridge().is_some() {
        info!("Listening for change events from other nodes");
    }

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;

            if !db::check_db_initialized(&pool).await {
                db::init_db(&pool).await?;
            }
            Arc::new(PgDocumentStore::new(pool, feed))
        }
        None => {
            warn!("DATABASE_URL not set, keeping documents in memory");
            Arc::new(MemoryStore::new(feed))
        }
    };

    let services = Services::new(
        store.clone(),
        Arc::new(StoreMemberDirectory::new(store)),
        Arc::new(StaticPermissions::new(config.moderator_ids.clone())),
        config.thread_settings(),
    );

    let _purge = spawn_purge_job(services.notifications.clone(), config.retention_policy());

    let app = routes::app(services);

    // Try consecutive ports
    let mut port = config.port;
    for attempt in 1..=MAX_BIND_ATTEMPTS {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        match axum::Server::try_bind(&addr) {
            Ok(server) => {
                info!("Server started at http://localhost:{}", port);
                info!("API documentation: http://localhost:{}/docs", port);
                info!(
                    "Notification socket: ws://localhost:{}/api/notifications/ws",
                    port
                );
                return server
                    .serve(app.into_make_service())
                    .await
                    .map_err(|e| e.into());
            }
            Err(e) => {
                warn!("Port {} unavailable: {}", port, e);
                if attempt == MAX_BIND_ATTEMPTS {
                    break;
                }
                port = match port.checked_add(1) {
                    Some(next) => next,
                    None => break,
                };
            }
        }
    }

    Err("Failed to bind to any port".into())
}
