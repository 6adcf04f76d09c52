//! mcv-webhook - 托管集群准入校验服务
//!
//! `serve` 启动 HTTP 服务；`descriptors` / `docs` / `check` 为离线生成与校验命令

mod cli;
mod dispatcher;
mod middleware;
mod routing;

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use mcv_bootstrap::{init_runtime, shutdown_signal};
use mcv_config::AppConfig;
use mcv_policy::{PolicySet, Registry, render_descriptors, render_docs, render_yaml};
use mcv_telemetry::init_metrics;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::dispatcher::Dispatcher;
use crate::routing::{AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config_dir)
        .with_context(|| format!("failed to load configuration from {}", cli.config_dir))?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Descriptors => {
            let policies = build_policies(&config)?;
            let yaml = render_yaml(&render_descriptors(&policies, &config.descriptor))?;
            print!("{}", yaml);
            Ok(())
        }
        Command::Docs => {
            let policies = build_policies(&config)?;
            let docs = serde_json::to_string_pretty(&render_docs(&policies))
                .context("failed to render webhook documentation")?;
            println!("{}", docs);
            Ok(())
        }
        Command::Check => {
            let policies = build_policies(&config)?;
            println!("{} webhooks OK", policies.len());
            Ok(())
        }
    }
}

fn build_policies(config: &AppConfig) -> anyhow::Result<PolicySet> {
    Registry::builtin()
        .build(&config.policies, &config.webhooks)
        .context("failed to build webhook policies")
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    init_runtime(&config);

    let policies = build_policies(&config)?;
    for policy in policies.iter() {
        info!(webhook = policy.name(), uri = %policy.uri(), "webhook enabled");
    }

    let metrics = if config.telemetry.metrics {
        Some(init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let app = router(AppState::new(Dispatcher::new(policies), metrics))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;

    info!(%addr, "Starting validation webhook");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Validation webhook stopped");
    Ok(())
}
