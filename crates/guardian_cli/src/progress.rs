//! Progress reporting for scan runs.
//!
//! Events from `guardian::sync` are rendered as structured log lines.

mod logging;

use std::sync::Arc;

use guardian::sync::ProgressCallback;

pub use logging::LoggingReporter;

impl LoggingReporter {
    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| reporter.handle(event))
    }
}
