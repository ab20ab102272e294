use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Register metric descriptions and, with `metrics-exporter`, serve them on
/// `0.0.0.0:<port>/metrics`.
#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    tracing::info!(port, "Prometheus exporter listening on /metrics");
    describe_metrics();
    metrics::gauge!("papertrade_up").set(1.0);
    Ok(())
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(_port: u16) -> anyhow::Result<()> {
    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!("papertrade_orders_submitted_total", "Orders booked by the execution side");
    metrics::describe_counter!("papertrade_orders_failed_total", "Submissions the execution side rejected");
    metrics::describe_counter!("papertrade_orders_blocked_total", "Submissions blocked locally (zero quantity, funds)");
    metrics::describe_gauge!("papertrade_up", "1 while the process is running");
}
