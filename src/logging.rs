//! Tracing subscriber setup for the `raceline` binary.
//!
//! Reads `RUST_LOG`, defaulting to `warn`. Output goes to stderr in compact
//! format so stdout stays clean for JSON results.
//!
//! ```bash
//! RUST_LOG=raceline=debug raceline optimize --pool drivers.json
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
