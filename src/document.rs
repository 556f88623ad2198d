//! Input documents: raw bytes, declared type, and the accepted formats.

use crate::error::VerifyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which kind of identity document the caller claims to have uploaded.
///
/// The declared type selects the prompt, the field set, and the
/// reconciliation/scoring rules for the whole analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    IdCard,
    Passport,
}

impl DocumentType {
    /// Parse a caller-supplied type string.
    ///
    /// Accepts the canonical names plus the short forms used by the upload form.
    /// The CLI's `--type` goes through here too.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "id_card" | "idcard" | "cni" => Some(DocumentType::IdCard),
            "passport" | "passeport" => Some(DocumentType::Passport),
            _ => None,
        }
    }

    /// Label written to `type_document` in the report.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::IdCard => "Carte Nationale d'Identité",
            DocumentType::Passport => "Passeport",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The upload formats the core accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Jpeg,
    Png,
}

impl DocumentFormat {
    /// Gate an upload by its declared MIME type.
    ///
    /// Entry point for a transport layer that receives multipart uploads; the
    /// CLI gates on [`DocumentFormat::from_filename`] instead. MIME parameters
    /// (`; charset=…`) are ignored. Anything outside PDF/JPEG/PNG is rejected
    /// before it reaches the pipeline.
    pub fn from_content_type(content_type: &str) -> Result<Self, VerifyError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Ok(DocumentFormat::Pdf),
            "image/jpeg" => Ok(DocumentFormat::Jpeg),
            "image/png" => Ok(DocumentFormat::Png),
            _ => Err(VerifyError::UnsupportedFormat {
                content_type: content_type.to_string(),
            }),
        }
    }

    /// Infer the format from a filename extension.
    pub fn from_filename(filename: &str) -> Result<Self, VerifyError> {
        match extension(filename).as_deref() {
            Some("pdf") => Ok(DocumentFormat::Pdf),
            Some("jpg") | Some("jpeg") => Ok(DocumentFormat::Jpeg),
            Some("png") => Ok(DocumentFormat::Png),
            other => Err(VerifyError::UnsupportedFormat {
                content_type: other
                    .map_or_else(|| "<no extension>".to_string(), |e| format!(".{e}")),
            }),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Jpeg => "image/jpeg",
            DocumentFormat::Png => "image/png",
        }
    }
}

/// Whether the rasterizer should treat `filename` as a paginated document.
pub fn is_paginated(filename: &str) -> bool {
    extension(filename).as_deref() == Some("pdf")
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// One uploaded document, as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    /// Original filename; only its extension is used (PDF vs. raster image).
    pub filename: String,
    pub doc_type: DocumentType,
}

impl Document {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        filename: impl Into<String>,
        doc_type: DocumentType,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            doc_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_gate() {
        assert_eq!(
            DocumentFormat::from_content_type("application/pdf").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_content_type("IMAGE/JPEG").unwrap(),
            DocumentFormat::Jpeg
        );
        assert_eq!(
            DocumentFormat::from_content_type("image/png; q=0.9").unwrap(),
            DocumentFormat::Png
        );
        assert!(matches!(
            DocumentFormat::from_content_type("image/gif"),
            Err(VerifyError::UnsupportedFormat { .. })
        ));
        assert!(DocumentFormat::from_content_type("").is_err());
    }

    #[test]
    fn filename_gate() {
        assert_eq!(DocumentFormat::from_filename("scan.PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_filename("recto.jpeg").unwrap(), DocumentFormat::Jpeg);
        assert_eq!(DocumentFormat::from_filename("a/b/recto.jpg").unwrap(), DocumentFormat::Jpeg);
        assert!(DocumentFormat::from_filename("notes.txt").is_err());
        assert!(DocumentFormat::from_filename("README").is_err());
    }

    #[test]
    fn paginated_only_for_pdf() {
        assert!(is_paginated("cni.pdf"));
        assert!(is_paginated("CNI.Pdf"));
        assert!(!is_paginated("cni.png"));
        assert!(!is_paginated("pdf"));
    }

    #[test]
    fn document_type_parse() {
        assert_eq!(DocumentType::parse("ID_CARD"), Some(DocumentType::IdCard));
        assert_eq!(DocumentType::parse("cni"), Some(DocumentType::IdCard));
        assert_eq!(DocumentType::parse("id-card"), Some(DocumentType::IdCard));
        assert_eq!(DocumentType::parse(" Passeport "), Some(DocumentType::Passport));
        assert_eq!(DocumentType::parse("PASSPORT"), Some(DocumentType::Passport));
        assert_eq!(DocumentType::parse("permis"), None);
    }
}
