mod cli;
mod extract;
mod filter;
mod kubernetes;
mod notifier;
mod supervisor;
mod tailer;
mod types;
mod utils;

use anyhow::Context;
use clap::Parser;
use regex::Regex;
use std::io::IsTerminal;
use tracing::info;

use cli::{Cli, Mode};
use kubernetes::{KubeLogSource, Selection, initialize_client, resolve_targets, watch_targets};
use notifier::StoreNotifier;
use supervisor::Supervisor;
use tailer::{Echo, Pipeline, ReconnectPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr, raw log lines to stdout
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let grep = match &cli.grep {
        Some(pattern) => Some(
            Regex::new(pattern).with_context(|| format!("Invalid regex pattern '{}'", pattern))?,
        ),
        None => None,
    };

    let client = initialize_client(cli.kubeconfig.as_deref()).await?;

    let notifier = StoreNotifier::new(&cli.store_domain, &cli.market_id, cli.notify_timeout())?;
    let echo = Echo::new(grep, std::io::stdout().is_terminal());
    let pipeline = Pipeline::new(cli.log_format, notifier, echo);
    let policy = match cli.mode {
        Mode::Once => ReconnectPolicy::Once,
        Mode::Watch => ReconnectPolicy::Follow {
            delay: cli.retry_delay(),
        },
    };
    let supervisor = Supervisor::new(KubeLogSource::new(client.clone()), pipeline, policy);

    let token = supervisor.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            token.cancel();
        }
    });

    match cli.mode {
        Mode::Once => {
            let selection = if cli.all_pods {
                Selection::All
            } else {
                Selection::First
            };
            let targets = resolve_targets(
                &client,
                &cli.namespace,
                cli.pod_name.as_deref(),
                &cli.pod_match,
                selection,
            )
            .await;
            if targets.is_empty() {
                anyhow::bail!(
                    "No pod matching '{}' found in namespace {}",
                    cli.pod_match,
                    cli.namespace
                );
            }
            supervisor.run_once(targets, cli.run_duration()).await
        }
        Mode::Watch => {
            info!(
                "Watching namespace {} for pods matching '{}'",
                cli.namespace, cli.pod_match
            );
            supervisor
                .run_watch(watch_targets(&client, &cli.namespace, &cli.pod_match))
                .await
        }
    }
}
