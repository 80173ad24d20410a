//! Query-string presets
//!
//! A preset such as `count=20&delay=50&endpoint=2.5` captures a burst so it
//! can be shared and replayed. Only values that differ from the defaults
//! are written.

use crate::models::{RawTestParams, TestConfig};
use url::{form_urlencoded, Url};

pub const KEY_COUNT: &str = "count";
pub const KEY_DELAY: &str = "delay";
pub const KEY_DELAY_INCREMENT: &str = "delayInc";
pub const KEY_ENDPOINT_DELAY: &str = "endpoint";
pub const KEY_ENDPOINT_DELAY_INCREMENT: &str = "endpointInc";

/// Parse a preset into raw parameters. Accepts a bare query string, one
/// with a leading `?`, or a full URL. Unknown keys are ignored; when a key
/// repeats, the last value wins.
pub fn parse_query(input: &str) -> RawTestParams {
    let trimmed = input.trim();
    let query = if trimmed.contains("://") {
        Url::parse(trimmed)
            .ok()
            .and_then(|url| url.query().map(str::to_string))
            .unwrap_or_default()
    } else {
        trimmed.trim_start_matches('?').to_string()
    };

    let mut raw = RawTestParams::default();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let value = Some(value.into_owned());
        match key.as_ref() {
            KEY_COUNT => raw.request_count = value,
            KEY_DELAY => raw.launch_delay_ms = value,
            KEY_DELAY_INCREMENT => raw.launch_delay_increment_ms = value,
            KEY_ENDPOINT_DELAY => raw.endpoint_delay_secs = value,
            KEY_ENDPOINT_DELAY_INCREMENT => raw.endpoint_delay_increment_secs = value,
            _ => {}
        }
    }
    raw
}

/// Render the shortest preset that reproduces `config`. Empty for the
/// default configuration.
pub fn to_query_string(config: &TestConfig) -> String {
    let defaults = TestConfig::default();
    let mut serializer = form_urlencoded::Serializer::new(String::new());

    if config.request_count != defaults.request_count {
        serializer.append_pair(KEY_COUNT, &config.request_count.to_string());
    }
    if config.initial_launch_delay_ms != defaults.initial_launch_delay_ms {
        serializer.append_pair(KEY_DELAY, &config.initial_launch_delay_ms.to_string());
    }
    if config.launch_delay_increment_ms != defaults.launch_delay_increment_ms {
        serializer.append_pair(KEY_DELAY_INCREMENT, &config.launch_delay_increment_ms.to_string());
    }
    if config.initial_endpoint_delay_secs != defaults.initial_endpoint_delay_secs {
        serializer.append_pair(KEY_ENDPOINT_DELAY, &config.initial_endpoint_delay_secs.to_string());
    }
    if config.endpoint_delay_increment_secs != defaults.endpoint_delay_increment_secs {
        serializer.append_pair(KEY_ENDPOINT_DELAY_INCREMENT, &config.endpoint_delay_increment_secs.to_string());
    }

    serializer.finish()
}
