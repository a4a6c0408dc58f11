use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

/// Installs the global subscriber. `RUST_LOG` wins, otherwise `info`.
pub fn init() {
    init_with_default("info");
}

/// Same as [`init`] with a different fallback level when `RUST_LOG` is unset.
pub fn init_with_default(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    // stdout belongs to the terminal preview.
    let subscriber = subscriber(env_filter, std::io::stderr);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = subscriber.try_init();
}

fn subscriber<W>(env_filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let is_debug = {
        let filter = env_filter.to_string();
        filter.contains("debug") || filter.contains("trace")
    };

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    tracing_subscriber::registry().with(env_filter).with(fmt_layer)
}
