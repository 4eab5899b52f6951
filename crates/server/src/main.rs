//! Democrasite server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use democrasite_api::{AppState, auth_middleware, router as api_router};
use democrasite_common::{AppError, Config};
use democrasite_core::{
    FavoriteService, NoOpMailer, RegistrationService, SearchService, SmtpMailer, TokenService,
    TopicAccessService, TopicService, UserService, VerificationMailer, VoteService,
};
use democrasite_db::repositories::{
    PendingRegistrationRepository, TopicAccessRepository, TopicFavoriteRepository,
    TopicRepository, UserRepository, VoteRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Pick the verification mailer: SMTP when configured, otherwise log-only.
fn build_mailer(config: &Config) -> Result<Arc<dyn VerificationMailer>, AppError> {
    let mailer: Arc<dyn VerificationMailer> = match &config.email {
        Some(email) => {
            info!(smtp_host = %email.smtp_host, "Using SMTP verification mailer");
            Arc::new(SmtpMailer::new(email, &config.registration)?)
        }
        None => {
            if config.registration.require_email_verification {
                warn!("No [email] section configured, verification links will only be logged");
            }
            Arc::new(NoOpMailer::new(&config.registration))
        }
    };
    Ok(mailer)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "democrasite=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting democrasite server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(democrasite_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    democrasite_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let pending_repo = PendingRegistrationRepository::new(Arc::clone(&db));
    let topic_repo = TopicRepository::new(Arc::clone(&db));
    let access_repo = TopicAccessRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));
    let favorite_repo = TopicFavoriteRepository::new(Arc::clone(&db));

    // Initialize services
    let mailer = build_mailer(&config)?;
    let registration_service = RegistrationService::new(
        user_repo.clone(),
        pending_repo,
        mailer,
        config.registration.clone(),
    );
    let removed = registration_service
        .cleanup_expired_pending_registrations()
        .await?;
    info!(removed, "Swept expired pending registrations");

    let state = AppState {
        user_service: UserService::new(
            user_repo.clone(),
            topic_repo.clone(),
            vote_repo.clone(),
            favorite_repo.clone(),
            access_repo.clone(),
            TokenService::new(&config.auth),
        ),
        registration_service,
        topic_service: TopicService::new(
            topic_repo.clone(),
            user_repo.clone(),
            access_repo.clone(),
            vote_repo.clone(),
            favorite_repo.clone(),
        ),
        vote_service: VoteService::new(topic_repo.clone(), vote_repo.clone(), access_repo.clone()),
        topic_access_service: TopicAccessService::new(
            topic_repo.clone(),
            user_repo.clone(),
            access_repo.clone(),
            vote_repo,
        ),
        favorite_service: FavoriteService::new(
            favorite_repo,
            topic_repo.clone(),
            user_repo.clone(),
        ),
        search_service: SearchService::new(topic_repo, user_repo),
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
