use std::{process::ExitCode, sync::Arc, time::Duration};

use raindrop_mcp::{
    build_app,
    config::{AppEnv, Config, TransportMode},
    domain::diagnostics::Diagnostics,
    http::oauth::OAuthClient,
    logging::{self, LogTarget},
    mcp::server::McpService,
    raindrop::RaindropClient,
    session::SessionManager,
    shutdown::shutdown_signal,
    stdio::serve_stdio,
    AppState,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let log_target = if config.transport == TransportMode::Stdio
        || config.app_env == AppEnv::Development
    {
        LogTarget::Stderr
    } else {
        LogTarget::Stdout
    };
    logging::init_logging(&config.log_level, log_target);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.access_token.is_none() {
        warn!("RAINDROP_ACCESS_TOKEN is not set; Raindrop.io calls will be rejected");
    }

    let client = RaindropClient::new(
        config.api_base.clone(),
        config.access_token.clone(),
        config.upstream_timeout,
    )?;
    info!(
        api_base = %client.base_url(),
        timeout_secs = config.upstream_timeout.as_secs(),
        "raindrop client ready"
    );

    let diagnostics = Diagnostics::new(
        match config.transport {
            TransportMode::Stdio => "stdio",
            TransportMode::Http => "http",
        },
        match config.app_env {
            AppEnv::Development => "development",
            AppEnv::Production => "production",
        },
        config.access_token.is_some(),
    );
    let service = Arc::new(McpService::new(Arc::new(client), diagnostics));

    match config.transport {
        TransportMode::Stdio => {
            serve_stdio(&service).await?;
            Ok(())
        }
        TransportMode::Http => serve_http(config, service).await,
    }
}

async fn serve_http(
    config: Config,
    service: Arc<McpService>,
) -> Result<(), Box<dyn std::error::Error>> {
    let oauth = OAuthClient::new(&config.oauth, config.upstream_timeout)?;
    let state = AppState::new(Arc::clone(&service), oauth)
        .with_api_token(config.api_token.clone())
        .with_session_recovery(config.session_recovery)
        .with_port(config.port);
    let sessions = Arc::clone(&state.sessions);

    if let Some(max_idle) = config.session_idle_timeout {
        spawn_idle_reaper(Arc::clone(&sessions), max_idle);
    }

    let bind_socket = config.bind_socket()?;
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        session_recovery = config.session_recovery,
        inbound_auth = config.api_token.is_some(),
        "server starting"
    );

    let app = build_app(state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let closed = sessions.close_all();
            info!(closed, "sessions closed, stopping listener");
        })
        .await?;

    info!("server stopped");
    Ok(())
}

fn spawn_idle_reaper(sessions: Arc<SessionManager>, max_idle: Duration) {
    let period = (max_idle / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            sessions.reap_idle(max_idle);
        }
    });
}
