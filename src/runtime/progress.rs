use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

/// Number of ticks drawn by the console bar unless configured otherwise.
pub const DEFAULT_PROGRESS_TICKS: usize = 20;

/// Receives `(done, max)` updates from long-running loops.
pub trait ProgressSink: Send + Sync {
    fn update(&self, done: u64, max: u64);

    /// Called once when the loop that reported progress completes.
    fn finish(&self);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _done: u64, _max: u64) {}

    fn finish(&self) {}
}

/// Redraws the bar in place on stdout through an `indicatif` progress bar.
///
/// A bar is created on the first update of a loop and dropped by `finish`, so
/// one instance can serve several loops in turn.
#[derive(Debug)]
pub struct ConsoleProgress {
    ticks: usize,
    hidden: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new(ticks: usize) -> Self {
        Self {
            ticks: ticks.max(1),
            hidden: false,
            bar: Mutex::new(None),
        }
    }

    /// Tracks progress without drawing anything.
    pub fn hidden(ticks: usize) -> Self {
        Self {
            hidden: true,
            ..Self::new(ticks)
        }
    }

    /// Current `(done, max)` of the active bar, if a loop is in progress.
    pub fn position(&self) -> Option<(u64, u64)> {
        let slot = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .map(|bar| (bar.position(), bar.length().unwrap_or(0)))
    }

    fn build_bar(&self, max: u64) -> ProgressBar {
        let target = if self.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stdout_with_hz(12)
        };
        let bar = ProgressBar::with_draw_target(Some(max), target);
        bar.set_style(bar_style(self.ticks));
        bar
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_TICKS)
    }
}

impl ProgressSink for ConsoleProgress {
    fn update(&self, done: u64, max: u64) {
        let mut slot = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        let bar = slot.get_or_insert_with(|| self.build_bar(max));
        bar.set_length(max);
        bar.set_position(done);
    }

    fn finish(&self) {
        let bar = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(bar) = bar {
            bar.finish();
        }
    }
}

/// Style whose only placeholder is filled by [`render_bar`].
fn bar_style(ticks: usize) -> ProgressStyle {
    ProgressStyle::with_template("{coprime_bar}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key(
            "coprime_bar",
            move |state: &ProgressState, out: &mut dyn std::fmt::Write| {
                let line = render_bar(state.pos(), state.len().unwrap_or(0), ticks);
                let _ = out.write_str(&line);
            },
        )
}

/// Renders `|===>    | done/max`.
///
/// Filled ticks are `done * ticks / max` (integer division), drawn as `=` with a
/// trailing `>`; the rest of the bar is padded with spaces. A zero `max` renders
/// as complete.
pub fn render_bar(done: u64, max: u64, ticks: usize) -> String {
    let filled = filled_ticks(done, max, ticks);
    let mut line = String::with_capacity(ticks + 24);

    line.push('|');
    for _ in 1..filled {
        line.push('=');
    }
    if filled != 0 {
        line.push('>');
    }
    for _ in filled..ticks {
        line.push(' ');
    }
    let _ = write!(line, "| {done}/{max}");

    line
}

fn filled_ticks(done: u64, max: u64, ticks: usize) -> usize {
    if max == 0 {
        return ticks;
    }
    let filled = (done as u128 * ticks as u128) / max as u128;
    filled.min(ticks as u128) as usize
}
