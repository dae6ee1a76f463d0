//! Daemon assembly and lifecycle.

use std::sync::Arc;

use anyhow::Context as _;
use tracing::info;
use whippet_aggregate::{Aggregator, AggregatorConfiguration};
use whippet_backends::MetricSender;
use whippet_config::GenericConfiguration;

use crate::internal;

fn default_backends() -> Vec<String> {
    vec!["console".to_string()]
}

/// Runs the daemon until interrupted.
pub(crate) async fn run(configuration: GenericConfiguration) -> Result<(), anyhow::Error> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        process_id = std::process::id(),
        "Whippet starting..."
    );

    let aggregator_config = configuration
        .as_typed::<AggregatorConfiguration>()
        .context("Failed to build aggregator configuration.")?;

    let backend_names = match configuration.try_get_typed::<Vec<String>>("backends")? {
        Some(names) if !names.is_empty() => names,
        _ => default_backends(),
    };

    let mut senders: Vec<Arc<dyn MetricSender>> = Vec::with_capacity(backend_names.len());
    for name in &backend_names {
        let sender = whippet_backends::from_name(name).with_context(|| format!("Failed to initialize backend '{}'.", name))?;
        senders.push(sender);
    }

    let aggregator = Aggregator::new(&aggregator_config, senders);
    let sink = aggregator.sink();
    let stats = aggregator.stats_handle();
    tokio::spawn(aggregator.run());

    // The UDP receiver is a separate deployable; in its absence the daemon still folds its own
    // liveness metrics through the public sink, exercising the full pipeline.
    tokio::spawn(internal::run_internal_source(sink));

    info!(
        backends = ?backend_names,
        flush_interval_secs = aggregator_config.flush_interval().as_secs(),
        expiry_interval_secs = aggregator_config.expiry_interval().as_secs(),
        max_workers = aggregator_config.max_workers(),
        "Whippet running. Waiting for interrupt..."
    );

    tokio::signal::ctrl_c().await.context("Failed to wait for interrupt signal.")?;

    let stats = stats.read();
    info!(
        last_message = stats.last_message,
        last_flush = stats.last_flush,
        bad_lines = stats.bad_lines,
        "Interrupt received. Whippet stopping..."
    );

    Ok(())
}
