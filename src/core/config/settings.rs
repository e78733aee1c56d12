use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_positive_u64, parse_u32,
    parse_u64,
};
use super::types::{
    ApiSettings, AttemptSettings, BaseUrl, ConfigError, RuntimeSettings, Settings,
    SubmissionSettings, TelemetrySettings, UploadSettings,
};

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_ATTEMPT_DIR: &str = ".portal/attempts";

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("PORTAL_ENV").or_else(|| env_optional("ENVIRONMENT")));

        let base_url = BaseUrl::parse(env_or_default("PORTAL_API_BASE_URL", DEFAULT_API_BASE_URL))?;
        let timeout_seconds = parse_positive_u64(
            "PORTAL_HTTP_TIMEOUT_SECONDS",
            env_or_default("PORTAL_HTTP_TIMEOUT_SECONDS", "30"),
        )?;
        let connect_timeout_seconds = parse_positive_u64(
            "PORTAL_HTTP_CONNECT_TIMEOUT_SECONDS",
            env_or_default("PORTAL_HTTP_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;

        let max_retries = parse_u32(
            "PORTAL_SUBMIT_MAX_RETRIES",
            env_or_default("PORTAL_SUBMIT_MAX_RETRIES", "3"),
        )?;
        let backoff_ms =
            parse_u64("PORTAL_SUBMIT_BACKOFF_MS", env_or_default("PORTAL_SUBMIT_BACKOFF_MS", "500"))?;

        let persist = env_optional("PORTAL_PERSIST_ATTEMPTS")
            .map(|value| parse_bool(&value))
            .unwrap_or(true);
        let directory = env_or_default("PORTAL_ATTEMPT_DIR", DEFAULT_ATTEMPT_DIR);

        let max_image_size_mb = parse_positive_u64(
            "PORTAL_MAX_IMAGE_SIZE_MB",
            env_or_default("PORTAL_MAX_IMAGE_SIZE_MB", "10"),
        )?;

        let log_level = env_or_default("PORTAL_LOG_LEVEL", "info");
        let json = env_optional("PORTAL_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        Ok(Self {
            runtime: RuntimeSettings { environment },
            api: ApiSettings { base_url, timeout_seconds, connect_timeout_seconds },
            submission: SubmissionSettings { max_retries, backoff_ms },
            attempts: AttemptSettings { persist, directory },
            uploads: UploadSettings { max_image_size_mb },
            telemetry: TelemetrySettings { log_level, json },
        })
    }

    /// Defaults with every knob fixed, pointed at `base_url`.
    pub fn with_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            runtime: RuntimeSettings { environment: super::types::Environment::Test },
            api: ApiSettings {
                base_url: BaseUrl::parse(base_url.to_string())?,
                timeout_seconds: 5,
                connect_timeout_seconds: 2,
            },
            submission: SubmissionSettings { max_retries: 2, backoff_ms: 10 },
            attempts: AttemptSettings { persist: false, directory: DEFAULT_ATTEMPT_DIR.to_string() },
            uploads: UploadSettings { max_image_size_mb: 10 },
            telemetry: TelemetrySettings { log_level: "debug".to_string(), json: false },
        })
    }

    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub fn submission(&self) -> &SubmissionSettings {
        &self.submission
    }

    pub fn attempts(&self) -> &AttemptSettings {
        &self.attempts
    }

    pub fn uploads(&self) -> &UploadSettings {
        &self.uploads
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }
}
