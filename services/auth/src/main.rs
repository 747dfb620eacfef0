use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use auth::repositories::{SessionRepository, UserRepository};
use auth::session::RedisSessionStore;
use auth::{
    AdminBootstrap, AuthConfig, AuthError, AuthService, JwtConfig, PasswordHasher, SessionBackend,
    SessionStore, TokenCodec,
};
use common::cache::{RedisConfig, RedisPool};
use common::database::{self, DatabaseConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let auth_config = AuthConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let sessions: Arc<dyn SessionStore> = match auth_config.session_backend {
        SessionBackend::Postgres => Arc::new(SessionRepository::new(pool.clone())),
        SessionBackend::Redis => {
            let redis_pool = RedisPool::new(&RedisConfig::from_env())?;
            let store = RedisSessionStore::new(redis_pool);
            if !store.health_check().await? {
                anyhow::bail!("Failed to connect to Redis");
            }
            info!("Redis connection successful");
            Arc::new(store)
        }
    };
    info!("Session backend: {:?}", auth_config.session_backend);

    let codec = TokenCodec::new(JwtConfig::from_env()?)?;
    let service = AuthService::new(
        Arc::new(UserRepository::new(pool)),
        sessions,
        codec,
        PasswordHasher::default(),
    )
    .with_store_timeout(auth_config.store_timeout);

    match AdminBootstrap::from_env() {
        Some(admin) => match service.bootstrap_admin(admin.into_new_user()).await {
            Ok(user) => info!("Created administrator {} ({})", user.username, user.id),
            Err(AuthError::AdminAlreadyExists) => {
                info!("Administrator already present, skipping bootstrap")
            }
            Err(e) => return Err(e.into()),
        },
        None if !service.admin_exists().await? => {
            warn!("No administrator exists and BOOTSTRAP_ADMIN_* is not set");
        }
        None => {}
    }

    info!("Authentication service initialized successfully");
    Ok(())
}
