use std::time::{Duration, Instant};

use crate::debounce::Debouncer;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Fraction of the viewport width the page may occupy.
    pub viewport_width_fraction: f32,
    /// Width reserved for the side panel while it is open.
    pub panel_margin_px: f32,
    /// Fraction of the viewport height the page may occupy.
    pub viewport_height_fraction: f32,
    /// Width changes smaller than this are treated as layout jitter.
    pub resize_threshold_px: f32,
    pub settle_delay: Duration,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            viewport_width_fraction: 0.95,
            panel_margin_px: 480.0,
            viewport_height_fraction: 0.9,
            resize_threshold_px: 2.0,
            settle_delay: Duration::from_millis(150),
        }
    }
}

/// Geometry inputs, all in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutMetrics {
    pub container_width: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub side_panel_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutTrigger {
    ContainerResized,
    ViewportResized,
    TransitionEnded,
}

/// Minimum of the natural container width, the panel-aware width bound and
/// the height-derived bound.
pub fn target_page_width(metrics: &LayoutMetrics, aspect_ratio: f32, config: &LayoutConfig) -> f32 {
    let panel_margin = if metrics.side_panel_open {
        config.panel_margin_px
    } else {
        0.0
    };
    let width_bound = metrics.viewport_width * config.viewport_width_fraction - panel_margin;
    let height_bound = metrics.viewport_height * config.viewport_height_fraction * aspect_ratio;

    metrics
        .container_width
        .min(width_bound)
        .min(height_bound)
        .max(0.0)
}

/// Sizes the active page. Resize signals are batched through a settle window
/// so a panel animation or a window drag produces one recomputation.
pub struct LayoutEngine {
    config: LayoutConfig,
    metrics: LayoutMetrics,
    aspect_ratio: Option<f32>,
    last_width: Option<f32>,
    settle: Debouncer,
    recomputations: u64,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig, metrics: LayoutMetrics) -> Self {
        let settle = Debouncer::new(config.settle_delay);
        Self {
            config,
            metrics,
            aspect_ratio: None,
            last_width: None,
            settle,
            recomputations: 0,
        }
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio.unwrap_or(1.0)
    }

    /// Set once per document from the first page; later calls are ignored
    /// since pages are assumed to share one size.
    pub fn set_aspect_ratio(&mut self, ratio: f32) -> bool {
        if self.aspect_ratio.is_some() || !ratio.is_finite() || ratio <= 0.0 {
            return false;
        }
        self.aspect_ratio = Some(ratio);
        true
    }

    /// Last accepted target width.
    pub fn target_width(&self) -> Option<f32> {
        self.last_width
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.settle.deadline()
    }

    /// Record new geometry and (re)start the settle window.
    pub fn trigger(&mut self, trigger: LayoutTrigger, metrics: LayoutMetrics, now: Instant) {
        log::trace!("Layout trigger {:?}: {:?}", trigger, metrics);
        self.metrics = metrics;
        self.settle.trigger(now);
    }

    /// Run the debounced recomputation once the settle window has elapsed.
    /// Returns the new width only when it moved past the jitter threshold.
    pub fn poll(&mut self, now: Instant) -> Option<f32> {
        if !self.settle.fire_if_due(now) {
            return None;
        }
        self.recompute()
    }

    /// Recompute immediately, dropping any pending settle timer.
    pub fn recompute_now(&mut self) -> Option<f32> {
        self.settle.cancel();
        self.recompute()
    }

    fn recompute(&mut self) -> Option<f32> {
        self.recomputations += 1;
        let width = target_page_width(&self.metrics, self.aspect_ratio(), &self.config);
        match self.last_width {
            Some(last) if (width - last).abs() < self.config.resize_threshold_px => {
                log::trace!("Layout change {:.1} -> {:.1} below threshold", last, width);
                None
            }
            _ => {
                log::debug!("Target page width {:.1}", width);
                self.last_width = Some(width);
                Some(width)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(container: f32, vw: f32, vh: f32, panel: bool) -> LayoutMetrics {
        LayoutMetrics {
            container_width: container,
            viewport_width: vw,
            viewport_height: vh,
            side_panel_open: panel,
        }
    }

    #[test]
    fn test_natural_width_wins_when_small() {
        let config = LayoutConfig::default();
        let w = target_page_width(&metrics(500.0, 1920.0, 1080.0, false), 1.0, &config);
        assert_eq!(w, 500.0);
    }

    #[test]
    fn test_panel_margin_bounds_width() {
        let config = LayoutConfig::default();
        let open = target_page_width(&metrics(2000.0, 1000.0, 5000.0, true), 1.0, &config);
        let closed = target_page_width(&metrics(2000.0, 1000.0, 5000.0, false), 1.0, &config);
        assert!((open - 470.0).abs() < 1e-3);
        assert!((closed - 950.0).abs() < 1e-3);
    }

    #[test]
    fn test_height_bound_uses_aspect_ratio() {
        let config = LayoutConfig::default();
        let w = target_page_width(&metrics(2000.0, 4000.0, 800.0, false), 0.5, &config);
        assert!((w - 800.0 * 0.9 * 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_never_negative() {
        let config = LayoutConfig::default();
        let w = target_page_width(&metrics(300.0, 200.0, 800.0, true), 1.0, &config);
        assert_eq!(w, 0.0);
    }

    #[test]
    fn test_burst_of_triggers_recomputes_once() {
        let start = Instant::now();
        let mut engine = LayoutEngine::new(LayoutConfig::default(), LayoutMetrics::default());
        for i in 0..8u64 {
            let m = metrics(400.0 + i as f32 * 10.0, 1600.0, 1000.0, false);
            engine.trigger(LayoutTrigger::ViewportResized, m, start + Duration::from_millis(i * 20));
        }
        let last = start + Duration::from_millis(140);

        assert_eq!(engine.poll(last + Duration::from_millis(100)), None);
        assert_eq!(engine.recomputations(), 0);

        assert_eq!(engine.poll(last + Duration::from_millis(150)), Some(470.0));
        assert_eq!(engine.recomputations(), 1);

        assert_eq!(engine.poll(last + Duration::from_millis(400)), None);
        assert_eq!(engine.recomputations(), 1);
    }

    #[test]
    fn test_small_changes_are_suppressed() {
        let now = Instant::now();
        let settle = LayoutConfig::default().settle_delay;
        let mut engine = LayoutEngine::new(LayoutConfig::default(), metrics(600.0, 1600.0, 1000.0, false));
        assert_eq!(engine.recompute_now(), Some(600.0));

        engine.trigger(LayoutTrigger::ContainerResized, metrics(601.5, 1600.0, 1000.0, false), now);
        assert_eq!(engine.poll(now + settle), None);
        assert_eq!(engine.target_width(), Some(600.0));

        engine.trigger(LayoutTrigger::TransitionEnded, metrics(640.0, 1600.0, 1000.0, false), now);
        assert_eq!(engine.poll(now + settle), Some(640.0));
    }

    #[test]
    fn test_aspect_ratio_is_set_once() {
        let mut engine = LayoutEngine::new(LayoutConfig::default(), LayoutMetrics::default());
        assert_eq!(engine.aspect_ratio(), 1.0);
        assert!(engine.set_aspect_ratio(0.75));
        assert!(!engine.set_aspect_ratio(1.3));
        assert_eq!(engine.aspect_ratio(), 0.75);
    }
}
