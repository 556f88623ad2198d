//! Pipeline stages for document analysis.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! can be tested without the others.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ llm ──▶ postprocess ──▶ reconcile ──▶ score
//! (pdfium/   (JPEG,    (VLM)   (JSON          (mask, fuse)  (checks)
//!  image)     base64)          cleanup)
//! ```
//!
//! 1. [`render`]      : bytes → ordered RGB page images; pdfium work runs in
//!    `spawn_blocking`
//! 2. [`encode`]      : JPEG-encode and base64-wrap each page
//! 3. [`llm`]         : one stateless vision request per page; the only stage
//!    with network I/O
//! 4. [`postprocess`] : strip fences and invisible characters from the answer
//! 5. [`reconcile`]   : mask fields by detected face, fuse pages
//! 6. [`score`]       : rule-based plausibility score

pub mod encode;
pub mod llm;
pub mod postprocess;
pub mod reconcile;
pub mod render;
pub mod score;
