//! Scripts injected into the remote page.
//!
//! Sources live next to this file and are embedded at compile time.

/// Hides the usual automation fingerprints (`navigator.webdriver` and friends).
pub const STEALTH: &str = include_str!("stealth.js");

/// Geometry and scrolling helpers, installed as `window.__feedtapTool`.
pub const TOOL: &str = include_str!("tool.js");

/// The `FeedtapClassObserver` primitive used by the DOM watcher.
pub const CLASS_OBSERVER: &str = include_str!("class_observer.js");

const MEDIA_CAPTURE_TEMPLATE: &str = include_str!("media_capture.js");

/// Render the media capture controller with concrete tuning values.
pub fn media_capture(block_size: u32, energy_threshold: f32, sample_rate: u32) -> String {
    MEDIA_CAPTURE_TEMPLATE
        .replace("__BLOCK_SIZE__", &block_size.to_string())
        .replace("__ENERGY_THRESHOLD__", &format_float(energy_threshold))
        .replace("__SAMPLE_RATE__", &sample_rate.to_string())
}

// JS has no literal for NaN/inf; callers validate before rendering.
fn format_float(value: f32) -> String {
    if value.is_finite() {
        format!("{:?}", value)
    } else {
        "0".to_string()
    }
}
