mod parsing;
mod settings;
mod types;

pub use types::{
    ApiSettings, AttemptSettings, BaseUrl, ConfigError, Environment, RuntimeSettings, Settings,
    SubmissionSettings, TelemetrySettings, UploadSettings,
};
