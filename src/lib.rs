//! # docverify
//!
//! Verify identity documents (Ivorian national ID cards and passports) with a
//! Vision Language Model.
//!
//! ## Why this crate?
//!
//! Scans of identity documents arrive as photos, phone captures or multi-page
//! PDFs holding front and back. Instead of template-matching every layout,
//! this crate rasterises each page, lets a VLM read it as a clerk would, then
//! reconciles the pages into one record and runs a few plausibility checks on
//! it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes + filename + declared type
//!  │
//!  ├─ 1. Render     PDF pages via pdfium (spawn_blocking) or decode JPEG/PNG
//!  ├─ 2. Encode     JPEG (quality 90) → base64 data URI
//!  ├─ 3. VLM        one stateless chat-completions request per page
//!  ├─ 4. Clean      strip fences, parse JSON, mask fields by detected face
//!  ├─ 5. Fuse       first non-empty value wins unless a later one is longer
//!  ├─ 6. Score      document number, validity period, birth date (+ jitter)
//!  └─ 7. Report     score, label, timestamp, info, justification
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docverify::{Analyzer, AnalysisConfig, Document, DocumentType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::builder()
//!         .vision_base_url("http://localhost:1234")
//!         .build()?;
//!     let analyzer = Analyzer::new(config)?;
//!
//!     let bytes = std::fs::read("cni.pdf")?;
//!     let doc = Document::new(bytes, "cni.pdf", DocumentType::IdCard);
//!     let report = analyzer.analyze(&doc).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docverify` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docverify = { version = "0.1", default-features = false }
//! ```
//!
//! ## Rendering Engine
//!
//! PDF input needs the pdfium shared library. It is looked up at
//! [`AnalysisConfig::pdfium_lib_path`], then `PDFIUM_LIB_PATH`, then the
//! system library path. JPEG and PNG input never touches pdfium.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod document;
pub mod error;
pub mod extraction;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_sync, Analyzer, FieldRow, IdCardAnalysis, PassportAnalysis};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use document::{Document, DocumentFormat, DocumentType};
pub use error::VerifyError;
pub use extraction::{IdCardExtraction, IdCardFields, PassportExtraction, Side};
pub use output::{IdCardRecord, PassportRecord, Report};
pub use pipeline::llm::{OpenAiCompatClient, VisionModel, VisionRequest};
pub use pipeline::score::{
    FixedJitter, JitterSource, RandomJitter, ScoreBreakdown, ScoredRecord, Scorer,
};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
