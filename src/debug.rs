//! Frame tracing, switched on by `NXOOB_DEBUG` or [`set_enabled`].

use std::sync::atomic::{AtomicBool, Ordering};

static FORCED: AtomicBool = AtomicBool::new(false);

/// Turn frame tracing on or off for the whole process, regardless of `NXOOB_DEBUG`.
pub fn set_enabled(enabled: bool) {
    FORCED.store(enabled, Ordering::Relaxed);
}

pub(crate) fn enabled() -> bool {
    FORCED.load(Ordering::Relaxed)
        || std::env::var("NXOOB_DEBUG")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
}

pub(crate) fn dump_frame(label: &str, frame: &str) {
    if !enabled() {
        return;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(len = frame.len(), "{label}: {frame}");

    #[cfg(not(feature = "tracing"))]
    eprintln!("{label} ({}): {frame}", frame.len());
}

pub(crate) fn note(subject: &str, message: &str) {
    if !enabled() {
        return;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(subject, "{message}");

    #[cfg(not(feature = "tracing"))]
    eprintln!("{subject}: {message}");
}
