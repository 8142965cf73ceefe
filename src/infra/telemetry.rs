use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::{
    breaker::{METRIC_BREAKER_OPENED, METRIC_BREAKER_REJECTED},
    editor::{METRIC_DRAFT_SAVE_MS, METRIC_DRAFT_SAVES},
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_BREAKER_OPENED,
            Unit::Count,
            "Total number of times an endpoint breaker started blocking calls."
        );
        describe_counter!(
            METRIC_BREAKER_REJECTED,
            Unit::Count,
            "Total number of calls rejected locally by an open breaker."
        );
        describe_counter!(
            METRIC_DRAFT_SAVES,
            Unit::Count,
            "Total number of draft create, auto-save and publish attempts by outcome."
        );
        describe_histogram!(
            METRIC_DRAFT_SAVE_MS,
            Unit::Milliseconds,
            "Draft create, auto-save and publish latency in milliseconds."
        );
    });
}
