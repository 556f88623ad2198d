//! Page rasterisation: document bytes → ordered RGB page images.
//!
//! PDFs are rendered page by page through pdfium at the configured scale; any
//! other upload is decoded as a single still image. Either way the result is
//! a non-empty `Vec<PageImage>` in page order, every page in RGB8.
//!
//! pdfium wants a file path, so PDF bytes are written to a [`NamedTempFile`]
//! first. The file is removed when the handle drops, which covers the success
//! path, every `?` exit, and a panic unwinding through the blocking task.
//! Removal errors are logged at debug level and otherwise ignored.
//!
//! Like the rest of pdfium work, rendering runs in `spawn_blocking`.

use crate::document::is_paginated;
use crate::error::VerifyError;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// One rendered page. `index` is 0-based within the document.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub index: usize,
    pub image: RgbImage,
}

/// Rendering knobs taken from [`crate::config::AnalysisConfig`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub scale_factor: f32,
    pub pdfium_lib_path: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale_factor: 2.0,
            pdfium_lib_path: None,
            scratch_dir: None,
        }
    }
}

/// Rasterise `bytes` into page images on the blocking thread pool.
pub async fn rasterize(
    bytes: &[u8],
    filename: &str,
    options: &RenderOptions,
) -> Result<Vec<PageImage>, VerifyError> {
    let bytes = bytes.to_vec();
    let filename = filename.to_string();
    let options = options.clone();

    tokio::task::spawn_blocking(move || rasterize_blocking(&bytes, &filename, &options))
        .await
        .map_err(|e| VerifyError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of [`rasterize`].
pub fn rasterize_blocking(
    bytes: &[u8],
    filename: &str,
    options: &RenderOptions,
) -> Result<Vec<PageImage>, VerifyError> {
    if is_paginated(filename) {
        render_pdf(bytes, filename, options)
    } else {
        decode_still(bytes, filename).map(|image| vec![PageImage { index: 0, image }])
    }
}

/// Decode a single JPEG/PNG upload.
fn decode_still(bytes: &[u8], filename: &str) -> Result<RgbImage, VerifyError> {
    let image = image::load_from_memory(bytes).map_err(|e| VerifyError::UnrenderableDocument {
        filename: filename.to_string(),
        detail: format!("image decode failed: {e}"),
    })?;
    debug!(
        "Decoded still image {} → {}x{} px",
        filename,
        image.width(),
        image.height()
    );
    Ok(image.to_rgb8())
}

fn render_pdf(
    bytes: &[u8],
    filename: &str,
    options: &RenderOptions,
) -> Result<Vec<PageImage>, VerifyError> {
    let tmp = write_scratch_pdf(bytes, options.scratch_dir.as_deref())?;
    let rendered = render_pdf_file(tmp.path(), filename, options);

    // The pdfium document is closed by now; drop the file on every path.
    if let Err(e) = tmp.close() {
        debug!("Could not remove scratch PDF: {}", e);
    }

    non_empty(rendered?, filename)
}

/// A paginated document must yield at least one page.
fn non_empty(pages: Vec<PageImage>, filename: &str) -> Result<Vec<PageImage>, VerifyError> {
    if pages.is_empty() {
        return Err(VerifyError::UnrenderableDocument {
            filename: filename.to_string(),
            detail: "PDF has no pages".into(),
        });
    }
    Ok(pages)
}

fn write_scratch_pdf(bytes: &[u8], dir: Option<&Path>) -> Result<NamedTempFile, VerifyError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("docverify-").suffix(".pdf");
    let mut tmp = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| VerifyError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| VerifyError::Internal(format!("tempfile write: {e}")))?;
    Ok(tmp)
}

fn render_pdf_file(
    path: &Path,
    filename: &str,
    options: &RenderOptions,
) -> Result<Vec<PageImage>, VerifyError> {
    let pdfium = bind_pdfium(options.pdfium_lib_path.as_deref())?;

    let document =
        pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| VerifyError::UnrenderableDocument {
                filename: filename.to_string(),
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(options.scale_factor);

    let mut results = Vec::with_capacity(total_pages);
    for (index, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            VerifyError::UnrenderableDocument {
                filename: filename.to_string(),
                detail: format!("page {}: {:?}", index + 1, e),
            }
        })?;

        let image = bitmap.as_image().to_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        results.push(PageImage { index, image });
    }

    Ok(results)
}

/// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the system library.
fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, VerifyError> {
    let from_env = std::env::var_os("PDFIUM_LIB_PATH")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    let bindings = match explicit.map(Path::to_path_buf).or(from_env) {
        Some(path) => Pdfium::bind_to_library(&path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| VerifyError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}
