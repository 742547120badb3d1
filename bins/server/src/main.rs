//! Campus API server.
//!
//! Serves payment records and the cash ledger over HTTP.

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_api::{AppState, TuitionBackend, create_router};
use campus_core::tuition::InMemoryTuitionRepository;
use campus_db::{PgTuitionRepository, connect_with_pool};
use campus_shared::{AppConfig, JwtConfig, JwtService, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let backend = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = connect_with_pool(
                &config.database.url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await?;
            info!(
                max_connections = config.database.max_connections,
                "Connected to database"
            );
            TuitionBackend::Postgres(PgTuitionRepository::new(db))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; records and ledger are lost on restart");
            TuitionBackend::Memory(InMemoryTuitionRepository::new())
        }
    };

    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: i64::try_from(config.jwt.access_token_expiry_secs / 60)?,
    });

    let app = create_router(AppState::new(backend, jwt_service));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
