use std::sync::{Mutex, MutexGuard, PoisonError};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

/// Snapshot of a tracker. `current` never exceeds `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub total: u64,
    pub current: u64,
    pub active: bool,
}

struct Inner {
    state: ProgressState,
    bar: Option<ProgressBar>,
}

/// Step counter for one verification run.
///
/// Every read and update goes through one lock, so the tracker can be shared
/// behind an `Arc` by concurrent steps. Reaching `total` finishes the run and
/// leaves the tracker inactive until the next [`ProgressTracker::begin`].
pub struct ProgressTracker {
    inner: Mutex<Inner>,
    display: bool,
}

impl ProgressTracker {
    /// A tracker that only keeps state.
    pub fn hidden() -> Self {
        Self::with_display(false)
    }

    /// A tracker that also draws a progress bar on stderr while active.
    pub fn visible() -> Self {
        Self::with_display(true)
    }

    fn with_display(display: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ProgressState::default(),
                bar: None,
            }),
            display,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking a run of `total` steps.
    pub fn begin(&self, total: u64) {
        let mut inner = self.lock();
        if inner.state.active {
            warn!(
                current = inner.state.current,
                total = inner.state.total,
                "progress tracker restarted while a run was still active"
            );
            if let Some(bar) = inner.bar.take() {
                bar.abandon();
            }
        }
        inner.state = ProgressState {
            total,
            current: 0,
            active: total > 0,
        };
        inner.bar = (self.display && total > 0).then(|| new_bar(total));
    }

    /// Advances by one step. A no-op once the run has finished.
    pub fn advance(&self) -> ProgressState {
        let mut inner = self.lock();
        if !inner.state.active {
            return inner.state;
        }
        inner.state.current += 1;
        debug!(
            current = inner.state.current,
            total = inner.state.total,
            "progress"
        );
        if let Some(bar) = &inner.bar {
            bar.inc(1);
        }
        if inner.state.current >= inner.state.total {
            inner.state.active = false;
            if let Some(bar) = inner.bar.take() {
                bar.finish();
            }
        }
        inner.state
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.lock().bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn snapshot(&self) -> ProgressState {
        self.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.lock().state.active
    }
}

fn new_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}
