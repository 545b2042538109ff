use std::process::ExitCode;

use clap::Parser;
use tollgate::{
    AppState,
    authenticator::{Authenticator, Authenticators, build_authenticators},
    build_app,
    config::GatewayConfig,
    observability,
};

/// CLI arguments for the tollgate gateway
#[derive(Parser, Debug)]
#[command(version, about = "Multi-tenant JWT auth and topic ACL gateway", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(
        short,
        long,
        global = true,
        env = "TOLLGATE_CONFIG",
        default_value = "tollgate.toml"
    )]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the gateway server (default)
    Serve,
    /// Load the config, build every vendor and print a summary
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match args.command {
        Some(Command::Check) => run_check(&args.config),
        Some(Command::Serve) | None => run_server(&args.config).await,
    }
}

fn load_config(config_path: &str) -> Result<GatewayConfig, String> {
    GatewayConfig::from_file(config_path)
        .map_err(|e| format!("Failed to load config from {config_path}: {e}"))
}

fn build(config: &GatewayConfig) -> Result<Authenticators, String> {
    build_authenticators(config).map_err(|e| format!("Failed to build vendors: {e}"))
}

fn run_check(config_path: &str) -> ExitCode {
    let authenticators = match load_config(config_path).and_then(|config| build(&config)) {
        Ok(authenticators) => authenticators,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "{} vendor(s), default {}",
        authenticators.len(),
        authenticators.default_vendor()
    );
    for company in authenticators.companies() {
        if let Some(authenticator) = authenticators.get(company) {
            println!("{}", summarize(authenticator));
        }
    }

    ExitCode::SUCCESS
}

fn summarize(authenticator: &Authenticator) -> String {
    let mut line = format!(
        "  {} ({})",
        authenticator.company(),
        authenticator.kind().as_str()
    );

    if let Authenticator::Manual(manual) = authenticator {
        line.push_str(&format!(
            ", {} key(s) {:?}",
            manual.keys().len(),
            manual.keys().algorithm()
        ));
    }

    if let Some(policy) = authenticator.policy() {
        let kinds: Vec<_> = policy.topics().rules().iter().map(|r| r.kind()).collect();
        line.push_str(&format!(
            ", access {:?}, topics [{}]",
            policy.allowed_access_types(),
            kinds.join(", ")
        ));
    }

    line
}

async fn run_server(config_path: &str) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Before building vendors, so their startup logs are kept.
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let authenticators = match build(&config) {
        Ok(authenticators) => authenticators,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    tracing::info!(
        vendors = ?authenticators.companies(),
        default_vendor = authenticators.default_vendor(),
        "Vendors loaded"
    );

    let bind_addr = config.server.bind_addr();
    let app = build_app(AppState::new(config, authenticators));

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
