use tracing_subscriber::EnvFilter;

/// Initialize tracing output. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("term_gateway=info,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
