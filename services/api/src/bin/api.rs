//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiSummaryAdapter},
    config::Config,
    error::ApiError,
    web::{
        analytics::{overview_handler, productivity_handler},
        auth::{login_handler, logout_handler, signup_handler},
        metrics::{
            ingest_batch_handler, ingest_sample_handler, session_anomalies_handler,
            session_summary_handler, session_trend_handler,
        },
        require_auth,
        sessions::{
            add_interactions_handler, create_session_handler, end_session_handler,
            get_session_handler, list_sessions_handler,
        },
        state::AppState,
        ApiDoc,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use studypulse_core::ports::SummaryGenerationService;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Summary Adapter (optional) ---
    let summary_adapter: Option<Arc<dyn SummaryGenerationService>> = match &config.openai_api_key {
        Some(api_key) => {
            let openai_client =
                Client::with_config(OpenAIConfig::new().with_api_key(api_key.clone()));
            Some(Arc::new(OpenAiSummaryAdapter::new(
                openai_client,
                config.summary_model.clone(),
            )))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; post-session summaries are disabled");
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        summary_adapter,
    });

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/sessions",
            post(create_session_handler).get(list_sessions_handler),
        )
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/end", post(end_session_handler))
        .route("/sessions/{id}/interactions", post(add_interactions_handler))
        .route("/metrics", post(ingest_sample_handler))
        .route("/metrics/batch", post(ingest_batch_handler))
        .route("/metrics/session/{id}/summary", get(session_summary_handler))
        .route("/metrics/session/{id}/trend", get(session_trend_handler))
        .route(
            "/metrics/session/{id}/anomalies",
            get(session_anomalies_handler),
        )
        .route("/analytics/overview", get(overview_handler))
        .route("/analytics/productivity-score", get(productivity_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
