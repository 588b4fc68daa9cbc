//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{ChannelSelectors, Config, FeedSelectors, NoteSelectors};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse into the first error, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(first) => Err(ConfigError::InvalidValue {
                field: first.path,
                message: first.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_browser(config, &mut result);
        Self::validate_site(config, &mut result);
        Self::validate_capture(config, &mut result);

        result
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        let browser = &config.browser;

        if !is_http_url(&browser.endpoint) && !browser.endpoint.starts_with("ws://") {
            result.add_error(ValidationError::new(
                "browser.endpoint",
                "endpoint must start with http://, https:// or ws://",
            ));
        }

        if browser.viewport_width == 0 || browser.viewport_height == 0 {
            result.add_error(ValidationError::new(
                "browser.viewport",
                "viewport dimensions must be greater than 0",
            ));
        }

        if browser.call_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "browser.call_timeout_secs",
                "call_timeout_secs must be greater than 0",
            ));
        } else if browser.call_timeout_secs > 300 {
            result.add_warning(ValidationWarning::new(
                "browser.call_timeout_secs",
                "call timeout is very high (>300s), a hung page will stall the session",
            ));
        }
    }

    fn validate_site(config: &Config, result: &mut ValidationResult) {
        let site = &config.site;

        if !is_http_url(&site.url) {
            result.add_error(ValidationError::new(
                "site.url",
                "url must start with http:// or https://",
            ));
        }

        if site.identity_api.is_empty() {
            result.add_warning(ValidationWarning::new(
                "site.identity_api",
                "identity_api is empty, every response will be parsed as an identity reply",
            ));
        }

        if site.overlay_class.is_empty() {
            result.add_error(ValidationError::new(
                "site.overlay_class",
                "overlay_class cannot be empty",
            ));
        } else if site.overlay_class.contains(char::is_whitespace) {
            result.add_error(ValidationError::new(
                "site.overlay_class",
                "overlay_class must be a single class name",
            ));
        }

        Self::validate_feed_selectors(&site.selectors.feed, result);
        Self::validate_note_selectors(&site.selectors.note, result);
        Self::validate_channel_selectors(&site.selectors.channel, result);
    }

    fn validate_feed_selectors(feed: &FeedSelectors, result: &mut ValidationResult) {
        let fields = [
            ("container", &feed.container),
            ("section", &feed.section),
            ("index_attribute", &feed.index_attribute),
            ("cover", &feed.cover),
            ("title", &feed.title),
            ("author", &feed.author),
            ("avatar", &feed.avatar),
            ("likes", &feed.likes),
            ("reload", &feed.reload),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("site.selectors.feed.{}", name),
                    "selector cannot be empty",
                ));
            }
        }
    }

    fn validate_note_selectors(note: &NoteSelectors, result: &mut ValidationResult) {
        let fields = [
            ("container", &note.container),
            ("type_attribute", &note.type_attribute),
            ("player", &note.player),
            ("video", &note.video),
            ("muted", &note.muted),
            ("volume_toggle", &note.volume_toggle),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("site.selectors.note.{}", name),
                    "selector cannot be empty",
                ));
            }
        }
    }

    fn validate_channel_selectors(channel: &ChannelSelectors, result: &mut ValidationResult) {
        for (name, value) in [("container", &channel.container), ("item", &channel.item)] {
            if value.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("site.selectors.channel.{}", name),
                    "selector cannot be empty",
                ));
            }
        }
        if channel.active_class.is_empty() || channel.active_class.contains(char::is_whitespace) {
            result.add_error(ValidationError::new(
                "site.selectors.channel.active_class",
                "active_class must be a single class name",
            ));
        }
    }

    fn validate_capture(config: &Config, result: &mut ValidationResult) {
        let capture = &config.capture;

        // ScriptProcessorNode only accepts powers of two in this range.
        let block = capture.audio_block_size;
        if !block.is_power_of_two() || !(256..=16384).contains(&block) {
            result.add_error(ValidationError::new(
                "capture.audio_block_size",
                "audio_block_size must be a power of two between 256 and 16384",
            ));
        }

        if !capture.energy_threshold.is_finite() || capture.energy_threshold < 0.0 {
            result.add_error(ValidationError::new(
                "capture.energy_threshold",
                "energy_threshold must be a non-negative number",
            ));
        } else if capture.energy_threshold == 0.0 {
            result.add_warning(ValidationWarning::new(
                "capture.energy_threshold",
                "energy_threshold is 0, only exact digital silence will be dropped",
            ));
        }

        if capture.sample_rate < 8000 || capture.sample_rate > 192_000 {
            result.add_warning(ValidationWarning::new(
                "capture.sample_rate",
                "sample_rate is outside 8000..=192000, the browser may reject it",
            ));
        }
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
