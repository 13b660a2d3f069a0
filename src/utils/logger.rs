use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when `RUST_LOG` is unset. Dependencies stay at warn either way.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,invoice_etl=debug"
    } else {
        "warn,invoice_etl=info"
    }
}

pub fn init_cli_logger(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    // Per-file lines are the main output, so timestamps only show up in verbose runs.
    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    if verbose {
        tracing_subscriber::registry().with(filter).with(layer).init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.without_time())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert!(default_directives(true).contains("invoice_etl=debug"));
        assert!(default_directives(false).contains("invoice_etl=info"));
        assert!(EnvFilter::try_new(default_directives(false)).is_ok());
    }
}
