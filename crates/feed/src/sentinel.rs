//! Scroll-position trigger for revealing the next page.

/// How far below the viewport the sentinel may sit and still trigger.
pub const DEFAULT_PRELOAD_MARGIN_PX: f64 = 500.0;

/// Position of the sentinel relative to the top of the viewport, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    pub viewport_height: f64,
    /// Top edge of the sentinel. Larger values are further down the page.
    pub sentinel_top: f64,
    pub sentinel_bottom: f64,
}

impl ViewportGeometry {
    /// Geometry of a zero-height sentinel at `sentinel_top`.
    pub fn new(viewport_height: f64, sentinel_top: f64) -> Self {
        Self {
            viewport_height,
            sentinel_top,
            sentinel_bottom: sentinel_top,
        }
    }
}

/// Decides when the end-of-list marker is close enough to load more.
///
/// The viewport is extended downwards by the margin; the sentinel triggers
/// while any part of it lies inside that extended area.
#[derive(Debug, Clone, Copy)]
pub struct ScrollSentinel {
    margin: f64,
}

impl ScrollSentinel {
    pub fn new(margin: f64) -> Self {
        Self {
            margin: margin.max(0.0),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn is_triggered(&self, geometry: ViewportGeometry) -> bool {
        geometry.sentinel_top <= geometry.viewport_height + self.margin
            && geometry.sentinel_bottom >= 0.0
    }
}

impl Default for ScrollSentinel {
    fn default() -> Self {
        Self::new(DEFAULT_PRELOAD_MARGIN_PX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_within_margin_below_viewport() {
        let sentinel = ScrollSentinel::default();
        assert!(sentinel.is_triggered(ViewportGeometry::new(800.0, 400.0)));
        assert!(sentinel.is_triggered(ViewportGeometry::new(800.0, 1300.0)));
        assert!(!sentinel.is_triggered(ViewportGeometry::new(800.0, 1300.5)));
    }

    #[test]
    fn scrolled_past_sentinel_does_not_trigger() {
        let sentinel = ScrollSentinel::default();
        let geometry = ViewportGeometry {
            viewport_height: 800.0,
            sentinel_top: -40.0,
            sentinel_bottom: -20.0,
        };
        assert!(!sentinel.is_triggered(geometry));
    }

    #[test]
    fn negative_margin_is_clamped() {
        let sentinel = ScrollSentinel::new(-10.0);
        assert_eq!(sentinel.margin(), 0.0);
        assert!(sentinel.is_triggered(ViewportGeometry::new(800.0, 800.0)));
    }
}
