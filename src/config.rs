//! Configuration for document analysis.
//!
//! Everything the pipeline needs from the outside (where the vision service
//! lives, which model to ask, how to render, how to judge) is carried by
//! [`AnalysisConfig`] and handed to the analyzer at construction. Nothing is
//! read from globals at call time except the `PDFIUM_LIB_PATH` fallback.

use crate::error::VerifyError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_VISION_BASE_URL: &str = "http://localhost:1234";
/// Static bearer token; local model gateways accept any value.
pub const DEFAULT_API_KEY: &str = "lm-studio";
pub const DEFAULT_MODEL: &str = "qwen3-vl-8b-instruct";

/// Configuration for analysing identity documents.
///
/// Built via [`AnalysisConfig::builder()`] or [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use docverify::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .vision_base_url("http://gpu-box:1234")
///     .scale_factor(3.0)
///     .score_threshold(80)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Base URL of the OpenAI-compatible vision service. Default: `http://localhost:1234`.
    ///
    /// Requests go to `{vision_base_url}/v1/chat/completions`.
    pub vision_base_url: String,

    /// Bearer token sent with every request. Default: `lm-studio`.
    pub api_key: String,

    /// Model identifier put in the request payload. Default: `qwen3-vl-8b-instruct`.
    pub model: String,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Per-request HTTP timeout in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Scale applied when rendering PDF pages. Range: 0.5–8.0. Default: 2.0.
    ///
    /// At 2.0 a typical ID-card scan on an A4 page renders around 1190×1684 px,
    /// enough for the model to read the MRZ and small print.
    pub scale_factor: f32,

    /// JPEG quality for the uploaded page image. Range: 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Threshold `justify` is computed against. Default: 75.
    pub score_threshold: u32,

    /// Maximum page extractions in flight at once. Default: 1 (strictly sequential).
    ///
    /// Results are always re-assembled in page order before reconciliation.
    pub concurrency: usize,

    /// Explicit pdfium library file. Falls back to `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Directory for the temporary PDF written during rendering. Default: OS temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            vision_base_url: DEFAULT_VISION_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            request_timeout_secs: 120,
            scale_factor: 2.0,
            jpeg_quality: 90,
            score_threshold: 75,
            concurrency: 1,
            pdfium_lib_path: None,
            scratch_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("vision_base_url", &self.vision_base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("scale_factor", &self.scale_factor)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("score_threshold", &self.score_threshold)
            .field("concurrency", &self.concurrency)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("scratch_dir", &self.scratch_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.vision_base_url.trim_end_matches('/')
        )
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn vision_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.vision_base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn scale_factor(mut self, scale: f32) -> Self {
        self.config.scale_factor = if scale.is_finite() {
            scale.clamp(0.5, 8.0)
        } else {
            scale
        };
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn score_threshold(mut self, threshold: u32) -> Self {
        self.config.score_threshold = threshold;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, VerifyError> {
        let c = &self.config;
        let url = c.vision_base_url.trim();
        if url.is_empty() {
            return Err(VerifyError::InvalidConfig(
                "vision_base_url must not be empty".into(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(VerifyError::InvalidConfig(format!(
                "vision_base_url must start with http:// or https://, got '{url}'"
            )));
        }
        if !c.scale_factor.is_finite() {
            return Err(VerifyError::InvalidConfig(format!(
                "scale_factor must be a finite number, got {}",
                c.scale_factor
            )));
        }
        if c.concurrency == 0 {
            return Err(VerifyError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.vision_base_url, "http://localhost:1234");
        assert_eq!(c.api_key, "lm-studio");
        assert_eq!(c.request_timeout_secs, 120);
        assert_eq!(c.scale_factor, 2.0);
        assert_eq!(c.jpeg_quality, 90);
        assert_eq!(c.score_threshold, 75);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn completions_url_trims_trailing_slash() {
        let c = AnalysisConfig::builder()
            .vision_base_url("http://127.0.0.1:1234/")
            .build()
            .unwrap();
        assert_eq!(c.completions_url(), "http://127.0.0.1:1234/v1/chat/completions");
    }

    #[test]
    fn setters_clamp() {
        let c = AnalysisConfig::builder()
            .scale_factor(100.0)
            .jpeg_quality(0)
            .temperature(-1.0)
            .build()
            .unwrap();
        assert_eq!(c.scale_factor, 8.0);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.temperature, 0.0);
    }

    #[test]
    fn build_rejects_bad_values() {
        assert!(matches!(
            AnalysisConfig::builder().vision_base_url("").build(),
            Err(VerifyError::InvalidConfig(_))
        ));
        assert!(AnalysisConfig::builder()
            .vision_base_url("localhost:1234")
            .build()
            .is_err());
        assert!(AnalysisConfig::builder().concurrency(0).build().is_err());
        assert!(AnalysisConfig::builder().scale_factor(f32::NAN).build().is_err());
    }
}
