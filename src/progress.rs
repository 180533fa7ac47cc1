//! Completion reporting.

use std::io::Write;

/// Forwards completion percentages to an optional callback, keeping them
/// non-decreasing and within [0, 100].
pub struct ProgressReporter<'a> {
    callback: Option<&'a mut dyn FnMut(f32)>,
    last: f32,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(callback: Option<&'a mut dyn FnMut(f32)>) -> Self {
        Self { callback, last: 0.0 }
    }

    pub fn none() -> Self {
        Self::new(None)
    }

    pub fn report(&mut self, percent: f32) {
        let percent = percent.clamp(0.0, 100.0).max(self.last);
        self.last = percent;
        if let Some(callback) = self.callback.as_mut() {
            callback(percent);
        }
    }

    /// Reports frame `done` of `total`; nothing when the total is unknown.
    pub fn report_frames(&mut self, done: u64, total: Option<u64>) {
        if let Some(total) = total.filter(|t| *t > 0) {
            self.report(100.0 * done as f32 / total as f32);
        }
    }
}

/// Prints progress on one console line.
pub fn console_progress() -> impl FnMut(f32) {
    move |percent| {
        let mut out = std::io::stderr().lock();
        let _ = write!(out, "\r{:3.0}%", percent);
        if percent >= 100.0 {
            let _ = writeln!(out);
        }
        let _ = out.flush();
    }
}
