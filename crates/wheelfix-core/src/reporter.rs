//! Reporter trait for dependency injection
//!
//! This trait allows the pipeline to report progress and per-artifact status
//! without being coupled to a specific console implementation.

/// Progress line emitted after every completed or errored artifact.
///
/// `done` and `total` include artifacts recorded by earlier runs, so the
/// numbers line up with the checkpoint rather than with this process.
pub fn progress_line(done: usize, total: usize) -> String {
    format!(
        "[PROGRESS] {done}/{total} processed | remaining: {}",
        total.saturating_sub(done)
    )
}

pub trait Reporter: Send + Sync {
    /// Indicates a new phase has started (e.g. "Querying", "Processing").
    fn section(&self, title: &str);

    /// Overall progress across the whole candidate set.
    fn progress(&self, done: usize, total: usize);

    /// Marks an artifact as recorded, with a short outcome description.
    fn done(&self, wheel: &str, detail: &str);

    /// Marks an artifact as errored; it stays unrecorded and is retried
    /// on the next run.
    fn failed(&self, wheel: &str, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Display the end-of-run summary block.
    fn summary(&self, text: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn progress(&self, done: usize, total: usize) {
        (**self).progress(done, total);
    }
    fn done(&self, wheel: &str, detail: &str) {
        (**self).done(wheel, detail);
    }
    fn failed(&self, wheel: &str, reason: &str) {
        (**self).failed(wheel, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn summary(&self, text: &str) {
        (**self).summary(text);
    }
}

impl<T: Reporter + ?Sized> Reporter for &T {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn progress(&self, done: usize, total: usize) {
        (**self).progress(done, total);
    }
    fn done(&self, wheel: &str, detail: &str) {
        (**self).done(wheel, detail);
    }
    fn failed(&self, wheel: &str, reason: &str) {
        (**self).failed(wheel, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn summary(&self, text: &str) {
        (**self).summary(text);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn progress(&self, _: usize, _: usize) {}
    fn done(&self, _: &str, _: &str) {}
    fn failed(&self, _: &str, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn summary(&self, _: &str) {}
}
