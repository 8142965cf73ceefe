//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::{
    breaker::{BreakerPolicy, DEFAULT_COOLDOWN, DEFAULT_MAX_FAILURES},
    editor::{
        AutosavePolicy, DEFAULT_CONTENT_DEBOUNCE, DEFAULT_TITLE_DEBOUNCE, SessionTimings,
        types::{DEFAULT_AUTOSAVE_INTERVAL, DEFAULT_LOAD_TIMEOUT, DEFAULT_SESSION_MAX_FAILURES},
    },
};
use crate::domain::uploads::DEFAULT_MAX_IMAGE_BYTES;
use crate::infra::blog_api::DEFAULT_REQUEST_TIMEOUT;

mod cli;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "drafthouse";
const ENV_PREFIX: &str = "DRAFTHOUSE";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub editor: EditorSettings,
    pub breaker: BreakerSettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EditorSettings {
    pub title_debounce: Duration,
    pub content_debounce: Duration,
    pub autosave_interval: Duration,
    pub max_failures: NonZeroU32,
    pub load_timeout: Duration,
    pub poll_interval: Duration,
}

impl EditorSettings {
    pub fn autosave_policy(&self) -> AutosavePolicy {
        AutosavePolicy {
            min_interval: self.autosave_interval,
            max_failures: self.max_failures,
            load_timeout: self.load_timeout,
        }
    }

    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            title_debounce: self.title_debounce,
            content_debounce: self.content_debounce,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub max_failures: NonZeroU32,
    pub cooldown: Duration,
}

impl BreakerSettings {
    pub fn policy(&self) -> BreakerPolicy {
        BreakerPolicy {
            max_failures: self.max_failures,
            cooldown: self.cooldown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_image_bytes: NonZeroU64,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_global_overrides(&cli.overrides);
    if let Command::Edit(args) = &cli.command {
        raw.apply_editor_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    api: RawApiSettings,
    editor: RawEditorSettings,
    breaker: RawBreakerSettings,
    uploads: RawUploadSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(path) = overrides.key_file.as_ref() {
            self.api.key_file = Some(path.clone());
        }
        if let Some(seconds) = overrides.api_timeout_seconds {
            self.api.timeout_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_editor_overrides(&mut self, overrides: &EditorOverrides) {
        if let Some(ms) = overrides.title_debounce_ms {
            self.editor.title_debounce_ms = Some(ms);
        }
        if let Some(ms) = overrides.content_debounce_ms {
            self.editor.content_debounce_ms = Some(ms);
        }
        if let Some(seconds) = overrides.autosave_interval_seconds {
            self.editor.autosave_interval_seconds = Some(seconds);
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.editor.poll_interval_ms = Some(ms);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            api,
            editor,
            breaker,
            uploads,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            api: build_api_settings(api)?,
            editor: build_editor_settings(editor)?,
            breaker: build_breaker_settings(breaker)?,
            uploads: build_upload_settings(uploads)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let base_url = api.base_url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    if let Some(url) = base_url.as_deref() {
        let parsed = url::Url::parse(url)
            .map_err(|err| LoadError::invalid("api.base_url", format!("invalid URL: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LoadError::invalid(
                "api.base_url",
                "scheme must be http or https",
            ));
        }
    }

    let timeout = seconds(
        api.timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_secs()),
        "api.timeout_seconds",
    )?;
    let key_file = api.key_file.filter(|path| !path.as_os_str().is_empty());

    Ok(ApiSettings {
        base_url,
        timeout,
        key_file,
    })
}

fn build_editor_settings(editor: RawEditorSettings) -> Result<EditorSettings, LoadError> {
    let title_debounce = millis(
        editor
            .title_debounce_ms
            .unwrap_or(duration_ms(DEFAULT_TITLE_DEBOUNCE)),
        "editor.title_debounce_ms",
    )?;
    let content_debounce = millis(
        editor
            .content_debounce_ms
            .unwrap_or(duration_ms(DEFAULT_CONTENT_DEBOUNCE)),
        "editor.content_debounce_ms",
    )?;
    let autosave_interval = seconds(
        editor
            .autosave_interval_seconds
            .unwrap_or(DEFAULT_AUTOSAVE_INTERVAL.as_secs()),
        "editor.autosave_interval_seconds",
    )?;
    let max_failures = non_zero_u32(
        editor
            .max_failures
            .unwrap_or(DEFAULT_SESSION_MAX_FAILURES.into()),
        "editor.max_failures",
    )?;
    let load_timeout = seconds(
        editor
            .load_timeout_seconds
            .unwrap_or(DEFAULT_LOAD_TIMEOUT.as_secs()),
        "editor.load_timeout_seconds",
    )?;
    let poll_interval = millis(
        editor.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        "editor.poll_interval_ms",
    )?;

    Ok(EditorSettings {
        title_debounce,
        content_debounce,
        autosave_interval,
        max_failures,
        load_timeout,
        poll_interval,
    })
}

fn build_breaker_settings(breaker: RawBreakerSettings) -> Result<BreakerSettings, LoadError> {
    let max_failures = non_zero_u32(
        breaker.max_failures.unwrap_or(DEFAULT_MAX_FAILURES.into()),
        "breaker.max_failures",
    )?;
    let cooldown = seconds(
        breaker
            .cooldown_seconds
            .unwrap_or(DEFAULT_COOLDOWN.as_secs()),
        "breaker.cooldown_seconds",
    )?;

    Ok(BreakerSettings {
        max_failures,
        cooldown,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let max_image_bytes = NonZeroU64::new(
        uploads
            .max_image_bytes
            .unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
    )
    .ok_or_else(|| LoadError::invalid("uploads.max_image_bytes", "must be greater than zero"))?;

    Ok(UploadSettings { max_image_bytes })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEditorSettings {
    title_debounce_ms: Option<u64>,
    content_debounce_ms: Option<u64>,
    autosave_interval_seconds: Option<u64>,
    max_failures: Option<u64>,
    load_timeout_seconds: Option<u64>,
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBreakerSettings {
    max_failures: Option<u64>,
    cooldown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_image_bytes: Option<u64>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
