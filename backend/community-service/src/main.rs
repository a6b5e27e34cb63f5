use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use chrono::Utc;
use community_service::cache::CachedProfileLookup;
use community_service::db::{
    ensure_content_tables, ContentStore, InMemoryContentStore, InMemoryProfiles,
    PgContentStore, PgProfileRepository, ProfileLookup, TimedStore,
};
use community_service::handlers;
use community_service::middleware::{AuthorizationResolver, JwtAuthMiddleware};
use community_service::realtime::BroadcastNotifier;
use community_service::services::{CommunityService, PostNormalizer};
use community_service::Config;
use crypto_core::{jwt, TokenVerifier};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct HealthState {
    db_pool: Option<PgPool>,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    status: ComponentStatus,
    storage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    timestamp: String,
}

impl HealthState {
    async fn check_postgres(&self) -> Result<(), sqlx::Error> {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.map(|_| ()),
            None => Ok(()),
        }
    }

    fn storage(&self) -> &'static str {
        if self.db_pool.is_some() {
            "postgresql"
        } else {
            "memory"
        }
    }
}

async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    match state.check_postgres().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "community-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "community-service"
        })),
    }
}

async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let start = Instant::now();
    let result = state.check_postgres().await;
    let latency_ms = Some(start.elapsed().as_millis() as u64);

    let (ready, status, message) = match result {
        Ok(_) => (true, ComponentStatus::Healthy, None),
        Err(e) => (
            false,
            ComponentStatus::Unhealthy,
            Some(format!("PostgreSQL connection failed: {}", e)),
        ),
    };

    let response = ReadinessResponse {
        ready,
        status,
        storage: state.storage(),
        message,
        latency_ms,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

type StoreBackends = (Arc<dyn ContentStore>, Arc<dyn ProfileLookup>, Option<PgPool>);

/// Community Service
///
/// Serves the campus community board under `/api/v1/community`:
///
/// - `/feed` - merged question/announcement feed
/// - `/posts/*` - post, comment and reply CRUD, likes, poll votes
/// - `/events` - server-sent change notifications
///
/// Storage is PostgreSQL when `DATABASE_URL` is set, otherwise an in-memory
/// store suitable for local development.
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()
        .map_err(anyhow::Error::msg)
        .context("Failed to load configuration")?;

    tracing::info!("Starting community-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let public_key = match config.auth.jwt_public_key_pem.clone() {
        Some(pem) => pem,
        None => jwt::load_validation_key().context("JWT public key is not configured")?,
    };
    let verifier = Arc::new(
        TokenVerifier::from_rsa_pem(&public_key).context("Failed to parse JWT public key")?,
    );
    tracing::info!("JWT verifier initialized");

    let store_deadline = Duration::from_millis(config.store.timeout_ms);
    let (store, profiles, db_pool): StoreBackends = match &config.database {
        Some(db) => {
            let pool = PgPoolOptions::new()
                .max_connections(db.max_connections)
                .acquire_timeout(store_deadline)
                .connect(&db.url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            ensure_content_tables(&pool)
                .await
                .context("Failed to ensure community tables")?;
            tracing::info!(max_connections = db.max_connections, "PostgreSQL store ready");

            (
                Arc::new(TimedStore::new(
                    PgContentStore::new(pool.clone()),
                    store_deadline,
                )),
                Arc::new(PgProfileRepository::new(pool.clone())),
                Some(pool),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            (
                Arc::new(InMemoryContentStore::new()),
                Arc::new(InMemoryProfiles::new()),
                None,
            )
        }
    };

    let profile_cache = Arc::new(CachedProfileLookup::with_limit(
        profiles,
        Duration::from_secs(config.profiles.cache_ttl_secs),
        config.profiles.cache_max_entries,
    ));
    if config.profiles.cache_ttl_secs > 0 {
        let cache = profile_cache.clone();
        let period = Duration::from_secs(config.profiles.cache_ttl_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                cache.purge_expired();
            }
        });
    }
    let profiles: Arc<dyn ProfileLookup> = profile_cache;

    let hub = Arc::new(BroadcastNotifier::new(config.realtime.channel_capacity));
    let policy = config.moderation_policy();
    tracing::info!(
        organizer_scope = ?policy.organizer_scope,
        mask_forbidden = policy.mask_forbidden_as_not_found,
        "moderation policy"
    );

    let service = Arc::new(CommunityService::new(
        store,
        PostNormalizer::new(profiles),
        AuthorizationResolver::new(policy),
        hub.clone(),
        config.service_settings(),
    ));

    let service_data = web::Data::new(service);
    let hub_data = web::Data::from(hub);
    let health_state = web::Data::new(HealthState { db_pool });
    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    let allowed_origins = config.cors.allowed_origins.clone();

    tracing::info!("Listening on {}", bind_address);

    HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(service_data.clone())
            .app_data(hub_data.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(community_service::metrics::serve_metrics),
            )
            .route("/api/v1/health", web::get().to(health_summary))
            .route("/api/v1/health/ready", web::get().to(readiness_summary))
            .route("/api/v1/health/live", web::get().to(liveness_check))
            .service(
                web::scope("/api/v1/community")
                    .wrap(JwtAuthMiddleware::new(verifier.clone()))
                    .configure(handlers::configure),
            )
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await
    .context("HTTP server error")?;

    tracing::info!("community-service shutting down");
    Ok(())
}
