//! Error types for the docverify library.
//!
//! There is exactly one fatal error type, [`VerifyError`]: any variant aborts
//! the analysis of the current document and no partial report is produced.
//!
//! A model answer that is not valid JSON is *not* an error. The vision stage
//! recovers it in place with an all-null extraction that keeps the raw text in
//! `raw_response`, so the report can still be assembled.

use thiserror::Error;

/// All fatal errors returned by the docverify library.
#[derive(Debug, Error)]
pub enum VerifyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload is not one of the accepted document formats.
    #[error("Unsupported document format '{content_type}' (accepted: application/pdf, image/jpeg, image/png)")]
    UnsupportedFormat { content_type: String },

    /// The bytes could not be turned into at least one page image.
    #[error("Document '{filename}' cannot be rendered: {detail}")]
    UnrenderableDocument { filename: String, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Vision service errors ─────────────────────────────────────────────
    /// The vision service answered with a non-success HTTP status.
    #[error("Vision service returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The vision service answered 2xx but without a `choices[0].message.content`.
    #[error("Unexpected response from vision service: {detail}")]
    UpstreamEnvelope { detail: String },

    /// The request never got an answer (connection refused, timeout, …).
    #[error("Vision service request failed: {detail}")]
    UpstreamRequest { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VerifyError {
    /// True for every failure attributable to the external vision service.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            VerifyError::UpstreamStatus { .. }
                | VerifyError::UpstreamEnvelope { .. }
                | VerifyError::UpstreamRequest { .. }
        )
    }
}
