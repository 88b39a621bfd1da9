use std::net::SocketAddr;
use std::sync::Arc;

use agrisafe_auth::{
    AuthOrchestrator, AuthState, Clock, OidcFederator, OsRandom, SecureRandom, SystemClock,
    UserStorage, VerificationTokenStorage, auth_router,
};
use agrisafe_auth_postgres::PostgresAuthStorage;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::mailer::SmtpMailer;

pub struct AgrisafeServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig, auth: AuthState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    auth_router(auth)
        .route("/healthz", get(healthz))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                // Path only: query strings may carry verification tokens or codes.
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.path = %req.uri().path(),
                )
            }),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Wires the orchestrator for the given storage backend.
///
/// The OIDC provider is discovered here. If discovery fails the server still
/// starts and the federated routes answer `503`.
pub async fn build_auth_state(
    cfg: &AppConfig,
    users: Arc<dyn UserStorage>,
    tokens: Arc<dyn VerificationTokenStorage>,
) -> anyhow::Result<AuthState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let random: Arc<dyn SecureRandom> = Arc::new(OsRandom);

    let mut orchestrator =
        AuthOrchestrator::from_config(&cfg.auth, users, tokens, clock.clone(), random.clone())?;

    if let Some(ref mail) = cfg.mail {
        orchestrator = orchestrator.with_mailer(Arc::new(SmtpMailer::new(mail)?));
        tracing::info!(host = %mail.host, port = mail.port, "SMTP verification mail enabled");
    } else {
        tracing::info!("No mail config; verification links are logged only");
    }

    if let Some(ref oidc) = cfg.auth.oidc {
        match OidcFederator::discover(oidc, clock, random).await {
            Ok(federator) => {
                tracing::info!(issuer = %federator.issuer(), "OIDC provider discovered");
                orchestrator = orchestrator.with_federator(Arc::new(federator));
            }
            Err(e) => {
                tracing::warn!(
                    issuer = %oidc.issuer,
                    error = %e,
                    "OIDC discovery failed; federated login disabled"
                );
            }
        }
    }

    Ok(AuthState::new(Arc::new(orchestrator), &cfg.auth))
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Connects to PostgreSQL, applies migrations and builds the router.
    pub async fn build(self) -> anyhow::Result<AgrisafeServer> {
        let db = &self.config.database;
        let storage = Arc::new(
            PostgresAuthStorage::connect_with(
                &db.connection_url(),
                db.pool_size,
                db.connect_timeout(),
            )
            .await?,
        );
        storage.migrate().await?;
        tracing::info!(pool_size = db.pool_size, "Database ready");

        let auth = build_auth_state(&self.config, storage.clone(), storage).await?;

        Ok(AgrisafeServer {
            addr: self.config.addr(),
            app: build_app(&self.config, auth),
        })
    }
}

impl AgrisafeServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
