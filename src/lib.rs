//! Client library for the education portal: the student assessment-taking
//! flow plus the profile and lecturer record operations, over the portal's
//! REST backend.

pub mod api;
pub mod core;
pub mod models;
pub mod repositories;
pub mod schemas;
pub mod services;
pub mod tasks;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, state::PortalContext, telemetry};

pub use crate::api::{ApiClient, ApiError};
pub use crate::services::attempt::{AttemptController, AttemptError, AttemptView, FinalizeOutcome};

/// Loads `.env` and settings, installs tracing and builds the context.
pub async fn connect() -> anyhow::Result<PortalContext> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let context = PortalContext::new(settings)?;
    tracing::info!(
        base_url = context.settings().api().base_url.as_str(),
        environment = context.settings().runtime().environment.as_str(),
        persist_attempts = context.settings().attempts().persist(),
        "Portal client ready"
    );

    if let Err(err) = context.refresh_user().await {
        tracing::warn!(error = %err, "No active session; sign in before taking assessments");
    }

    Ok(context)
}
