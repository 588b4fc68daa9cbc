//! Host-side references to remote elements and their geometry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute stamped on elements the host needs to find again.
pub const REF_ATTRIBUTE: &str = "data-feedtap-ref";

/// A remote element, addressed by a CSS selector.
///
/// References are re-resolved on every use, so one that outlives its
/// element simply stops matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    /// Reference to an element stamped with [`REF_ATTRIBUTE`] = `tag`.
    pub fn tagged(tag: &str) -> Self {
        Self(format!("[{}=\"{}\"]", REF_ATTRIBUTE, tag.replace('"', "\\\"")))
    }

    /// Descendant of this element matching `selector`.
    pub fn child(&self, selector: &str) -> Self {
        Self(format!("{} {}", self.0, selector))
    }

    pub fn selector(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the injected `getElementInfo` helper.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ElementInfo {
    pub scroll: ScrollInfo,
    pub element: ElementGeometry,
}

/// Document scroll offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollInfo {
    pub scroll_y: f64,
    pub scroll_x: f64,
}

/// Element size and position relative to the viewport and the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementGeometry {
    /// Height of the part inside the viewport.
    pub visible_height: f64,
    pub actual_height: f64,
    pub content_height: f64,
    pub viewport_top: f64,
    pub viewport_bottom: f64,
    pub absolute_top: f64,
    pub absolute_bottom: f64,
    pub is_fully_visible: bool,
    pub is_partially_visible: bool,
    pub visible_ratio: f64,
    pub top_from_viewport_top: f64,
    pub bottom_from_viewport_bottom: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_selector() {
        let r = ElementRef::tagged("feed-12");
        assert_eq!(r.selector(), "[data-feedtap-ref=\"feed-12\"]");
        assert_eq!(r.child("a.cover").selector(), "[data-feedtap-ref=\"feed-12\"] a.cover");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let r = ElementRef::new("#noteContainer video");
        assert_eq!(serde_json::to_value(&r).unwrap(), "#noteContainer video");
    }

    #[test]
    fn test_element_info_deserialize() {
        let info: ElementInfo = serde_json::from_str(
            r#"{
                "scroll": {"scrollY": 120, "scrollX": 0},
                "element": {
                    "visibleHeight": 648, "actualHeight": 4000, "contentHeight": 4000,
                    "viewportTop": 120, "viewportBottom": 4120,
                    "absoluteTop": 240, "absoluteBottom": 4240,
                    "isFullyVisible": false, "isPartiallyVisible": true,
                    "visibleRatio": 0.162, "topFromViewportTop": 120,
                    "bottomFromViewportBottom": -3352
                }
            }"#,
        )
        .unwrap();
        assert_eq!(info.scroll.scroll_y, 120.0);
        assert_eq!(info.element.visible_height, 648.0);
        assert!(info.element.is_partially_visible);
        assert!(!info.element.is_fully_visible);
    }
}
