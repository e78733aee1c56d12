use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Installs the global subscriber for hosts that have none of their own.
/// `RUST_LOG` takes precedence over `PORTAL_LOG_LEVEL`.
pub fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_level))
        .map_err(|err| anyhow::anyhow!("invalid log filter {:?}: {err}", telemetry.log_level))?;

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = if telemetry.json {
        builder.json().flatten_event(true).with_current_span(false).try_init()
    } else {
        builder.compact().try_init()
    };

    installed.map_err(|err| anyhow::anyhow!("tracing subscriber already installed: {err}"))
}
