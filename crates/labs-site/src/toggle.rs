//! Responsive toggle for the index page's about panel.
//!
//! On desktop layouts a click on the toggle fades the about, blog and
//! projects panels in or out together. Narrower layouts stack the panels,
//! so the same click scrolls down to the about section instead and leaves
//! the panels alone.
//!
//! The viewport check is injected through [`Viewport`] and the DOM through
//! [`Page`], so both branches can be driven without a browser.

use std::time::Duration;

/// Runtime capability check for the current viewport.
pub trait Viewport {
    /// Whether the viewport is at least `px` CSS pixels wide.
    fn min_width(&self, px: u32) -> bool;
}

impl<F> Viewport for F
where
    F: Fn(u32) -> bool,
{
    fn min_width(&self, px: u32) -> bool {
        self(px)
    }
}

/// The parts of the document the toggle touches.
pub trait Page {
    /// Fade every element matching `selector` in or out over `duration`.
    ///
    /// Returns the number of elements matched.
    fn fade_toggle(&mut self, selector: &str, duration: Duration) -> usize;

    /// Document offset of the first element matching `selector`.
    fn offset_top(&self, selector: &str) -> Option<f64>;

    /// Smoothly scroll the document to `top` over `duration`.
    fn animate_scroll(&mut self, top: f64, duration: Duration);
}

/// Visibility of the panel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Collapsed,
    Expanded,
}

impl PanelState {
    fn flipped(self) -> Self {
        match self {
            Self::Collapsed => Self::Expanded,
            Self::Expanded => Self::Collapsed,
        }
    }
}

/// What a click did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToggleOutcome {
    /// Panels were faded; carries the new state.
    Faded(PanelState),

    /// The document scrolled to `top`.
    Scrolled { top: f64 },

    /// Nothing on the page matched.
    Skipped,
}

/// Selectors, breakpoint and timings.
#[derive(Debug, Clone)]
pub struct ToggleConfig {
    /// Panels faded together on desktop
    pub panels: Vec<String>,

    /// Scroll target on narrow layouts
    pub anchor: String,

    /// Minimum viewport width of the desktop layout
    pub breakpoint_px: u32,

    /// jQuery's "fast"
    pub fade_duration: Duration,

    pub scroll_duration: Duration,

    /// Added to the anchor offset so the section heading clears the fold
    pub scroll_offset: f64,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self {
            panels: vec![
                ".index__about".to_string(),
                ".index__blog".to_string(),
                ".index__projects".to_string(),
            ],
            anchor: "#about".to_string(),
            breakpoint_px: 1024,
            fade_duration: Duration::from_millis(200),
            scroll_duration: Duration::from_millis(2000),
            scroll_offset: 1.0,
        }
    }
}

/// Click handler for the about toggle.
#[derive(Debug)]
pub struct AboutToggle<V> {
    config: ToggleConfig,
    viewport: V,
    state: PanelState,
}

impl<V: Viewport> AboutToggle<V> {
    /// Create a collapsed toggle.
    pub fn new(config: ToggleConfig, viewport: V) -> Self {
        Self {
            config,
            viewport,
            state: PanelState::Collapsed,
        }
    }

    /// Current panel state.
    pub fn state(&self) -> PanelState {
        self.state
    }

    /// Handle one click on the toggle.
    pub fn click<P: Page>(&mut self, page: &mut P) -> ToggleOutcome {
        if self.viewport.min_width(self.config.breakpoint_px) {
            self.fade_panels(page)
        } else {
            self.scroll_to_anchor(page)
        }
    }

    fn fade_panels<P: Page>(&mut self, page: &mut P) -> ToggleOutcome {
        let matched: usize = self
            .config
            .panels
            .iter()
            .map(|selector| page.fade_toggle(selector, self.config.fade_duration))
            .sum();

        if matched == 0 {
            tracing::debug!("No panels matched {:?}", self.config.panels);
            return ToggleOutcome::Skipped;
        }

        self.state = self.state.flipped();
        ToggleOutcome::Faded(self.state)
    }

    fn scroll_to_anchor<P: Page>(&self, page: &mut P) -> ToggleOutcome {
        let Some(offset) = page.offset_top(&self.config.anchor) else {
            tracing::debug!("Anchor {} not found", self.config.anchor);
            return ToggleOutcome::Skipped;
        };

        let top = offset + self.config.scroll_offset;
        page.animate_scroll(top, self.config.scroll_duration);

        ToggleOutcome::Scrolled { top }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakePage {
        visible: HashMap<String, bool>,
        anchors: HashMap<String, f64>,
        scroll_top: f64,
        scroll_durations: Vec<Duration>,
        fade_durations: Vec<Duration>,
    }

    impl FakePage {
        fn index() -> Self {
            let mut page = Self::default();
            for panel in ToggleConfig::default().panels {
                page.visible.insert(panel, false);
            }
            page.anchors.insert("#about".to_string(), 900.0);
            page
        }
    }

    impl Page for FakePage {
        fn fade_toggle(&mut self, selector: &str, duration: Duration) -> usize {
            self.fade_durations.push(duration);
            match self.visible.get_mut(selector) {
                Some(visible) => {
                    *visible = !*visible;
                    1
                }
                None => 0,
            }
        }

        fn offset_top(&self, selector: &str) -> Option<f64> {
            self.anchors.get(selector).copied()
        }

        fn animate_scroll(&mut self, top: f64, duration: Duration) {
            self.scroll_top = top;
            self.scroll_durations.push(duration);
        }
    }

    fn desktop(px: u32) -> bool {
        1280 >= px
    }

    fn phone(px: u32) -> bool {
        375 >= px
    }

    #[test]
    fn starts_collapsed() {
        let toggle = AboutToggle::new(ToggleConfig::default(), desktop);
        assert_eq!(toggle.state(), PanelState::Collapsed);
    }

    #[test]
    fn desktop_click_flips_panels_without_scrolling() {
        let mut page = FakePage::index();
        let mut toggle = AboutToggle::new(ToggleConfig::default(), desktop);

        let outcome = toggle.click(&mut page);
        assert_eq!(outcome, ToggleOutcome::Faded(PanelState::Expanded));
        assert!(page.visible.values().all(|v| *v));

        let outcome = toggle.click(&mut page);
        assert_eq!(outcome, ToggleOutcome::Faded(PanelState::Collapsed));
        assert!(page.visible.values().all(|v| !*v));

        assert_eq!(page.scroll_top, 0.0);
        assert!(page.scroll_durations.is_empty());
        assert!(page
            .fade_durations
            .iter()
            .all(|d| *d == Duration::from_millis(200)));
    }

    #[test]
    fn narrow_click_scrolls_to_anchor() {
        let mut page = FakePage::index();
        let mut toggle = AboutToggle::new(ToggleConfig::default(), phone);

        let outcome = toggle.click(&mut page);

        assert_eq!(outcome, ToggleOutcome::Scrolled { top: 901.0 });
        assert_eq!(page.scroll_top, 901.0);
        assert_eq!(page.scroll_durations, vec![Duration::from_millis(2000)]);

        toggle.click(&mut page);
        assert_eq!(toggle.state(), PanelState::Collapsed);
        assert!(page.visible.values().all(|v| !*v));
        assert!(page.fade_durations.is_empty());
    }

    #[test]
    fn breakpoint_is_inclusive() {
        let mut page = FakePage::index();
        let exactly = |px: u32| 1024 >= px;
        let mut toggle = AboutToggle::new(ToggleConfig::default(), exactly);

        assert!(matches!(toggle.click(&mut page), ToggleOutcome::Faded(_)));
    }

    #[test]
    fn missing_elements_are_a_no_op() {
        let mut page = FakePage::default();

        let mut wide = AboutToggle::new(ToggleConfig::default(), desktop);
        assert_eq!(wide.click(&mut page), ToggleOutcome::Skipped);
        assert_eq!(wide.state(), PanelState::Collapsed);

        let mut narrow = AboutToggle::new(ToggleConfig::default(), phone);
        assert_eq!(narrow.click(&mut page), ToggleOutcome::Skipped);
        assert_eq!(page.scroll_top, 0.0);
    }
}
