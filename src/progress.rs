//! Progress-callback trait for per-page analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to be told when
//! each page is sent to the vision model and when it comes back. The CLI uses
//! it to drive a progress bar; a server could forward it to a websocket.

use std::sync::Arc;

/// Called by the analyzer as it processes each page.
///
/// All methods default to no-ops. With `concurrency > 1` the page methods may
/// be called from several tasks at once, so implementations must be
/// `Send + Sync` and synchronise their own state.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once the document is rasterised and the page count is known.
    fn on_analysis_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the vision request for a page (1-indexed) is sent.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when the vision model has answered for a page.
    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called once the report is assembled.
    fn on_analysis_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// No-op callback, the default when nothing is configured.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
