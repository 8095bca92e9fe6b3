use mimalloc::MiMalloc;
use sqlito::connection::{ConnectionResolver, ManagementClient};
use sqlito::credentials::{CredentialStore, SecretCipher};
use sqlito::gateway::{GatewayLauncher, StdioLauncher};
use sqlito::llm::{AnthropicModel, LanguageModel};
use sqlito::orchestrator::Orchestrator;
use sqlito::server::{SqlitoState, build_client, sqlito_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = sqlito::config::Config::from_toml();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        loglevel = %cfg.basic.loglevel,
        listen_addr = %cfg.basic.listen_addr,
        listen_port = cfg.basic.listen_port,
        model = %cfg.llm.model,
        max_steps = cfg.llm.max_steps,
        stream_format = ?cfg.basic.stream_format,
        gateway_command = %cfg.gateway.command,
        read_only_guard = cfg.gateway.read_only_guard,
        "Configuration loaded"
    );

    let db = sqlito::db::spawn(&cfg.basic.database_url).await;
    let cipher = SecretCipher::new(&cfg.security.encryption_key);
    let store: Arc<dyn CredentialStore> =
        Arc::new(sqlito::credentials::spawn(cipher, Some(db)).await);

    let launcher = StdioLauncher::new(cfg.gateway.clone());
    // A missing launcher only fails chat requests; credential routes stay usable.
    match launcher.probe() {
        Ok(path) => info!(path = %path.display(), "Tool server launcher found"),
        Err(e) => warn!(error = %e, "Tool server launcher not found; chat requests will fail with 503"),
    }
    let launcher: Arc<dyn GatewayLauncher> = Arc::new(launcher);

    let llm_client = build_client(cfg.llm.proxy.as_ref())?;
    let model: Arc<dyn LanguageModel> =
        Arc::new(AnthropicModel::new(Arc::new(cfg.llm.clone()), llm_client));

    let management_client = build_client(cfg.management.proxy.as_ref())?;
    let management = ManagementClient::new(&cfg.management, management_client);

    let orchestrator = Orchestrator {
        store,
        launcher,
        model,
        resolver: ConnectionResolver::new(cfg.management.pooler_host.clone()),
        management: Some(management),
        max_steps: cfg.llm.max_steps,
    };
    let sqlito_key: Arc<str> = Arc::from(cfg.basic.sqlito_key.as_str());
    let state = SqlitoState::new(orchestrator, sqlito_key, cfg.basic.stream_format);
    let app = sqlito_router(state);

    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
