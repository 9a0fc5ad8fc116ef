use crate::{BackendIdentity, BackendTag};
use serde::Serialize;

/// What clicking the indicator should bring to the front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickTarget {
    pub backend: BackendTag,
    pub app_id: &'static str,
    pub window_role: Option<&'static str>,
}

/// Everything a renderer needs to draw the indicator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct IndicatorView {
    pub visible: bool,
    /// Style tokens of all contributors, oldest contributor first.
    pub classes: Vec<&'static str>,
    pub contributors: Vec<BackendTag>,
    pub click_target: Option<ClickTarget>,
}

/// Receives the indicator view whenever it changes.
pub trait IndicatorSink {
    fn render(&mut self, view: &IndicatorView);
}

/// The single source of truth for whether the unread-message indicator is shown.
///
/// The indicator is visible iff at least one backend contributes to it. Contributors are kept in
/// the order in which they last raised a notification; the click target always points at the most
/// recent contributor that can be focused.
pub struct IndicatorState {
    contributors: Vec<&'static BackendIdentity>,
    sink: Box<dyn IndicatorSink>,
    rendered: IndicatorView,
    torn_down: bool,
}

impl std::fmt::Debug for IndicatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorState")
            .field("contributors", &self.contributors.iter().map(|b| b.tag).collect::<Vec<_>>())
            .field("rendered", &self.rendered)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl IndicatorState {
    /// Create a hidden indicator. The sink is handed the initial (hidden) view right away.
    pub fn new(mut sink: Box<dyn IndicatorSink>) -> Self {
        let rendered = IndicatorView::default();
        sink.render(&rendered);
        IndicatorState { contributors: Vec::new(), sink, rendered, torn_down: false }
    }

    /// Mark `backend` as having unseen messages. Returns true if it wasn't contributing before.
    pub fn show(&mut self, backend: &'static BackendIdentity) -> bool {
        if self.torn_down {
            log::warn!("ignoring show({}) on a torn down indicator", backend.tag);
            return false;
        }
        let was_contributing = self.remove(backend.tag);
        self.contributors.push(backend);
        self.sync();
        !was_contributing
    }

    /// Withdraw the contribution of `tag`. Other contributors are untouched. Returns true if `tag`
    /// was contributing.
    pub fn hide(&mut self, tag: BackendTag) -> bool {
        let removed = self.remove(tag);
        if removed {
            self.sync();
        }
        removed
    }

    /// Withdraw every contribution, returning the tags that were removed.
    pub fn clear_all(&mut self) -> Vec<BackendTag> {
        let removed = self.contributors.drain(..).map(|backend| backend.tag).collect();
        self.sync();
        removed
    }

    /// Final release at the end of an enable/disable cycle. Calling this more than once is a no-op.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        let removed = self.clear_all();
        if !removed.is_empty() {
            log::debug!("indicator torn down with pending contributors: {:?}", removed);
        }
        self.torn_down = true;
    }

    pub fn is_visible(&self) -> bool {
        !self.contributors.is_empty()
    }

    pub fn is_contributing(&self, tag: BackendTag) -> bool {
        self.contributors.iter().any(|backend| backend.tag == tag)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn contributors(&self) -> impl Iterator<Item = BackendTag> + '_ {
        self.contributors.iter().map(|backend| backend.tag)
    }

    pub fn click_target(&self) -> Option<&ClickTarget> {
        self.rendered.click_target.as_ref()
    }

    /// The view that was last handed to the sink.
    pub fn view(&self) -> &IndicatorView {
        &self.rendered
    }

    fn remove(&mut self, tag: BackendTag) -> bool {
        let before = self.contributors.len();
        self.contributors.retain(|backend| backend.tag != tag);
        self.contributors.len() != before
    }

    /// The contributor a click on the indicator should focus.
    pub fn click_backend(&self) -> Option<&'static BackendIdentity> {
        self.contributors.iter().rev().copied().find(|backend| backend.focusable)
    }

    fn compute_view(&self) -> IndicatorView {
        let click_target = self.click_backend().map(|backend| ClickTarget {
            backend: backend.tag,
            app_id: backend.app_id,
            window_role: backend.conversation_window_role,
        });
        IndicatorView {
            visible: self.is_visible(),
            classes: self.contributors.iter().map(|backend| backend.style_class).collect(),
            contributors: self.contributors().collect(),
            click_target,
        }
    }

    fn sync(&mut self) {
        let view = self.compute_view();
        if view != self.rendered {
            log::debug!("indicator changed: visible={} contributors={:?}", view.visible, view.contributors);
            self.sink.render(&view);
            self.rendered = view;
        }
    }
}
