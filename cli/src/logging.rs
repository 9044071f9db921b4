use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the stderr subscriber once.
///
/// The default level is `info`; `WAKEFUL_LOG` overrides it with the
/// usual env-filter syntax.
pub fn init() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .with_env_var("WAKEFUL_LOG")
            .from_env_lossy();

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(UtcTime::rfc_3339())
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
    });
}
