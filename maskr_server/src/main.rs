//! Maskr relay server.
//!
//! Serves the public HTTP API and the internal mask lookup listener over one
//! PostgreSQL database, with the domain allow-list cached in memory.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error};
use log::info;
use maskr::{
    AuthManager, DomainCache, EmailManager, MaskLookup, MaskManager, SessionManager, TokenService,
    captcha::{CaptchaVerifier, DisabledCaptcha, RecaptchaVerifier},
    db::{Database, PgStore},
    kv::PgKeyValueStore,
    mailer::{ConsoleMailer, Mailer, ZeptoMailer},
    oauth::GoogleOAuth,
    security::{CredentialHasher, RateLimiter, RevocationLedger},
};
use maskr_server::{
    api::{self, lookup::LookupState},
    config::ServerConfig,
    logging, metrics,
};
use pico_args::Arguments;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

const HELP: &str = "\
Run the maskr relay API and mask lookup server

USAGE:
  maskr_server [OPTIONS]

OPTIONS:
  --bind         IP:PORT   API bind address           [default: env SERVER_BIND or 127.0.0.1:3000]
  --lookup-bind  IP:PORT   Lookup bind address        [default: env LOOKUP_BIND or 127.0.0.1:50051]
  --db-url       URL       Database connection string [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               JWT signing secret (at least 32 characters)
  PRODUCTION               Require real providers and trust X-Real-Ip [default: true]
  (See .env.example for all configuration options)
";

/// Interval between purges of expired key-value rows
const KV_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let lookup_bind: Option<SocketAddr> = pargs.opt_value_from_str("--lookup-bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;

    logging::init();

    let config = ServerConfig::from_env(bind, lookup_bind, database_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics exposed at http://{}/metrics", addr);
    }

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;
    info!("Database connected and migrated");

    let pool = db.pool().clone();
    let store = Arc::new(PgStore::new(pool.clone()));
    let kv = Arc::new(PgKeyValueStore::new(pool));

    let domains = Arc::new(
        DomainCache::load(store.clone())
            .await
            .context("Failed to load mask domains")?,
    );
    let domain_count = domains.values().await.len();
    metrics::cached_domains(domain_count);
    info!("Loaded {} mask domain(s)", domain_count);

    let mailer: Arc<dyn Mailer> = match &config.providers.mail {
        Some(mail) => Arc::new(ZeptoMailer::new(mail.clone())?),
        None => {
            log::warn!("No mail provider configured, codes will be logged");
            Arc::new(ConsoleMailer)
        }
    };

    let captcha: Arc<dyn CaptchaVerifier> = match &config.providers.captcha_secret {
        Some(secret) => Arc::new(RecaptchaVerifier::new(secret.clone())?),
        None => {
            log::warn!("No CAPTCHA secret configured, CAPTCHA checks are disabled");
            Arc::new(DisabledCaptcha)
        }
    };

    let tokens = TokenService::new(&config.security.jwt_secret, config.security.tokens);
    let hasher = CredentialHasher::new();

    let mut auth = AuthManager::new(
        store.clone(),
        store.clone(),
        store.clone(),
        tokens.clone(),
        hasher.clone(),
        mailer.clone(),
        captcha,
    );
    if let Some(google) = &config.providers.google {
        auth = auth.with_oauth(Arc::new(GoogleOAuth::new(google.clone())?));
        info!("Google sign-in enabled");
    }

    let state = api::AppState {
        auth: Arc::new(auth),
        sessions: Arc::new(SessionManager::new(
            store.clone(),
            tokens,
            RevocationLedger::new(kv.clone()),
        )),
        emails: Arc::new(EmailManager::new(
            store.clone(),
            store.clone(),
            domains.clone(),
            hasher,
            mailer,
        )),
        masks: Arc::new(MaskManager::new(
            store.clone(),
            store.clone(),
            domains.clone(),
        )),
        domains: domains.clone(),
        rate_limiter: RateLimiter::new(kv.clone(), config.rate_limit),
        store: store.clone(),
        kv: kv.clone(),
        production: config.production,
    };
    let lookup_state = LookupState {
        lookup: Arc::new(MaskLookup::new(store.clone(), domains.clone())),
    };

    // Background tasks stop when this flips to true
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = domains
        .clone()
        .spawn_refresh(config.domain_refresh, shutdown_rx.clone());
    let purger = spawn_kv_purge(kv, shutdown_rx.clone());

    let api_listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    let lookup_listener = tokio::net::TcpListener::bind(config.lookup_bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.lookup_bind))?;

    info!("API listening on http://{}", config.bind);
    info!("Mask lookup listening on http://{}", config.lookup_bind);

    let api_server = {
        let mut shutdown = shutdown_rx.clone();
        axum::serve(
            api_listener,
            api::create_router(state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
    };
    let lookup_server = {
        let mut shutdown = shutdown_rx.clone();
        axum::serve(lookup_listener, api::lookup::create_lookup_router(lookup_state))
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
    };

    let api_task = tokio::spawn(async move { api_server.await });
    let lookup_task = tokio::spawn(async move { lookup_server.await });

    shutdown_signal().await;
    info!("Shutting down server...");
    let _ = shutdown_tx.send(true);

    let drained = tokio::time::timeout(config.shutdown_grace, async {
        for (name, task) in [("api", api_task), ("lookup", lookup_task)] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("{} server error: {}", name, e),
                Err(e) => log::error!("{} server task failed: {}", name, e),
            }
        }
        let _ = refresher.await;
        let _ = purger.await;
    })
    .await;
    if drained.is_err() {
        log::warn!(
            "Shutdown grace period of {}s elapsed, exiting",
            config.shutdown_grace.as_secs()
        );
    }

    db.close().await;
    info!("Server stopped");

    Ok(())
}

/// Purge expired rate limit counters and revocation tombstones
fn spawn_kv_purge(kv: Arc<PgKeyValueStore>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(KV_PURGE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match kv.purge_expired().await {
                        Ok(0) => {}
                        Ok(purged) => log::debug!("Purged {} expired key-value entries", purged),
                        Err(e) => log::error!("Key-value purge failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
