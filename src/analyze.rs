//! Document analysis entry points.
//!
//! [`Analyzer`] runs one document through the pipeline:
//!
//! ```text
//! Rasterize → ExtractPerPage* → Clean → Fuse → Score → Assemble
//! ```
//!
//! The run is linear. Rendering and upstream failures abort the analysis and
//! are returned as-is; no partial report is produced. A model answer that is
//! not JSON is not a failure: that page simply contributes nothing.
//!
//! Pages may be extracted concurrently (`concurrency > 1`), but results are
//! always collected in page order since fusion depends on it.

use crate::config::AnalysisConfig;
use crate::document::{Document, DocumentType};
use crate::error::VerifyError;
use crate::extraction::{IdCardExtraction, IdCardFields, PassportExtraction};
use crate::output::{
    format_analysis_date, justify, IdCardRecord, PassportRecord, Report, VERIFICATION_NUMBER,
};
use crate::pipeline::llm::{self, OpenAiCompatClient, VisionModel};
use crate::pipeline::render::{self, PageImage, RenderOptions};
use crate::pipeline::score::{JitterSource, ScoredRecord, Scorer};
use crate::pipeline::reconcile;
use crate::prompts::acceptance_message;
use chrono::Local;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Full result of an ID-card analysis: the report plus what it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct IdCardAnalysis {
    /// Cleaned per-page extractions, in page order.
    pub pages: Vec<IdCardExtraction>,
    pub scored: ScoredRecord<IdCardRecord>,
    pub report: Report,
}

/// One row of [`IdCardAnalysis::field_table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRow {
    pub field: &'static str,
    pub fused: Option<String>,
    /// One entry per page, in page order.
    pub pages: Vec<Option<String>>,
}

impl IdCardAnalysis {
    /// Field × (fused, page 1..n) comparison, in declared field order.
    pub fn field_table(&self) -> Vec<FieldRow> {
        IdCardFields::ALL
            .iter()
            .map(|&field| FieldRow {
                field,
                fused: self.scored.record.fields.get(field).map(str::to_string),
                pages: self
                    .pages
                    .iter()
                    .map(|p| p.fields.get(field).map(str::to_string))
                    .collect(),
            })
            .collect()
    }
}

/// Full result of a passport analysis.
#[derive(Debug, Clone, Serialize)]
pub struct PassportAnalysis {
    pub extraction: PassportExtraction,
    pub scored: ScoredRecord<PassportRecord>,
    pub report: Report,
}

/// Runs documents through the pipeline with a fixed configuration.
///
/// Holds no per-document state; one analyzer can serve many concurrent calls.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    model: Arc<dyn VisionModel>,
    scorer: Scorer,
}

impl Analyzer {
    /// Build an analyzer talking to the configured OpenAI-compatible service.
    pub fn new(config: AnalysisConfig) -> Result<Self, VerifyError> {
        let model = Arc::new(OpenAiCompatClient::from_config(&config)?);
        Ok(Self {
            config,
            model,
            scorer: Scorer::default(),
        })
    }

    /// Replace the vision backend.
    pub fn with_vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.model = model;
        self
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the scoring jitter, e.g. with a fixed value for reproducible scores.
    pub fn with_jitter(self, jitter: Arc<dyn JitterSource>) -> Self {
        self.with_scorer(Scorer::new(jitter))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze a document according to its declared type.
    pub async fn analyze(&self, document: &Document) -> Result<Report, VerifyError> {
        match document.doc_type {
            DocumentType::IdCard => Ok(self
                .analyze_id_card_detailed(&document.bytes, &document.filename)
                .await?
                .report),
            DocumentType::Passport => Ok(self
                .analyze_passport_detailed(&document.bytes, &document.filename)
                .await?
                .report),
        }
    }

    /// Analyze an ID card (one or more pages, front and/or back).
    pub async fn analyze_id_card(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<Report, VerifyError> {
        Ok(self.analyze_id_card_detailed(bytes, filename).await?.report)
    }

    /// Analyze a passport from its biographic page.
    pub async fn analyze_passport(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<Report, VerifyError> {
        Ok(self.analyze_passport_detailed(bytes, filename).await?.report)
    }

    pub async fn analyze_id_card_detailed(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<IdCardAnalysis, VerifyError> {
        let total_start = Instant::now();
        info!("Analysing ID card: {}", filename);

        let pages = self.rasterize(bytes, filename).await?;
        let analysis = self.analyze_id_card_pages(&pages).await?;

        info!(
            "ID card analysis complete: {} pages, score {:?}, {}ms total",
            pages.len(),
            analysis.report.score,
            total_start.elapsed().as_millis()
        );
        Ok(analysis)
    }

    /// Run extraction onwards on pages that are already rendered.
    pub async fn analyze_id_card_pages(
        &self,
        pages: &[PageImage],
    ) -> Result<IdCardAnalysis, VerifyError> {
        self.notify_start(pages.len());

        let llm_start = Instant::now();
        let quality = self.config.jpeg_quality;
        let model = self.model.as_ref();
        let raw = self
            .extract_all(pages, |page| llm::extract_id_card_page(model, page, quality))
            .await?;
        info!(
            "Extracted {} pages in {}ms",
            raw.len(),
            llm_start.elapsed().as_millis()
        );

        let cleaned = reconcile::clean_id_card_pages(raw);
        for (i, page) in cleaned.iter().enumerate() {
            debug!("Page {}: cleaned face = {}", i + 1, page.side.as_str());
        }
        let fused = reconcile::fuse_id_card(&cleaned);
        let scored = self.scorer.score_id_card(fused);

        let report = assemble_report(
            DocumentType::IdCard,
            scored.score,
            scored.record.info(),
            self.config.score_threshold,
        );

        self.notify_complete(pages.len());
        Ok(IdCardAnalysis {
            pages: cleaned,
            scored,
            report,
        })
    }

    pub async fn analyze_passport_detailed(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<PassportAnalysis, VerifyError> {
        let total_start = Instant::now();
        info!("Analysing passport: {}", filename);

        let pages = self.rasterize(bytes, filename).await?;
        let analysis = self.analyze_passport_pages(&pages).await?;

        info!(
            "Passport analysis complete: {}ms total",
            total_start.elapsed().as_millis()
        );
        Ok(analysis)
    }

    /// Only the first page is read; any further pages are ignored.
    pub async fn analyze_passport_pages(
        &self,
        pages: &[PageImage],
    ) -> Result<PassportAnalysis, VerifyError> {
        let first = &pages[..pages.len().min(1)];
        if pages.len() > 1 {
            debug!("Passport has {} pages, reading page 1 only", pages.len());
        }
        self.notify_start(first.len());

        let llm_start = Instant::now();
        let quality = self.config.jpeg_quality;
        let model = self.model.as_ref();
        let extractions = self
            .extract_all(first, |page| llm::extract_passport_page(model, page, quality))
            .await?;
        info!("Extracted passport page in {}ms", llm_start.elapsed().as_millis());

        let record = reconcile::fuse_passport(&extractions);
        let scored = self.scorer.score_passport(record);
        let report = assemble_report(
            DocumentType::Passport,
            scored.score,
            scored.record.info(),
            self.config.score_threshold,
        );

        self.notify_complete(first.len());
        Ok(PassportAnalysis {
            extraction: extractions.into_iter().next().unwrap_or_default(),
            scored,
            report,
        })
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn rasterize(&self, bytes: &[u8], filename: &str) -> Result<Vec<PageImage>, VerifyError> {
        let options = RenderOptions {
            scale_factor: self.config.scale_factor,
            pdfium_lib_path: self.config.pdfium_lib_path.clone(),
            scratch_dir: self.config.scratch_dir.clone(),
        };
        let render_start = Instant::now();
        let pages = render::rasterize(bytes, filename, &options).await?;
        info!(
            "Rendered {} pages in {}ms",
            pages.len(),
            render_start.elapsed().as_millis()
        );
        Ok(pages)
    }

    /// Extract every page with at most `concurrency` requests in flight.
    ///
    /// Results come back in page order; the first error aborts the rest.
    async fn extract_all<'a, T, F, Fut>(
        &self,
        pages: &'a [PageImage],
        extract: F,
    ) -> Result<Vec<T>, VerifyError>
    where
        F: Fn(&'a PageImage) -> Fut,
        Fut: Future<Output = Result<T, VerifyError>> + 'a,
    {
        let total = pages.len();
        let progress = self.config.progress_callback.clone();

        stream::iter(pages.iter().map(|page| {
            let progress = progress.clone();
            let extraction = extract(page);
            async move {
                let page_num = page.index + 1;
                if let Some(ref cb) = progress {
                    cb.on_page_start(page_num, total);
                }
                let result = extraction.await;
                if let (Some(cb), Ok(_)) = (&progress, &result) {
                    cb.on_page_complete(page_num, total);
                }
                result
            }
        }))
        .buffered(self.config.concurrency.max(1))
        .try_collect()
        .await
    }

    fn notify_start(&self, total: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_start(total);
        }
    }

    fn notify_complete(&self, total: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_complete(total);
        }
    }
}

fn assemble_report(
    doc_type: DocumentType,
    score: Option<u8>,
    info: BTreeMap<String, Option<String>>,
    score_threshold: u32,
) -> Report {
    Report {
        score,
        type_document: doc_type.label().to_string(),
        date_analyse: format_analysis_date(&Local::now()),
        info,
        verification_number: VERIFICATION_NUMBER,
        justify: Some(justify(
            VERIFICATION_NUMBER,
            score_threshold,
            acceptance_message(doc_type),
        )),
    }
}

/// Analyze a document with a one-off [`Analyzer`].
pub async fn analyze(document: &Document, config: &AnalysisConfig) -> Result<Report, VerifyError> {
    Analyzer::new(config.clone())?.analyze(document).await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(document: &Document, config: &AnalysisConfig) -> Result<Report, VerifyError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| VerifyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(document, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::Side;
    use crate::output::NON_CONFORMING;
    use crate::pipeline::llm::VisionRequest;
    use crate::pipeline::score::FixedJitter;
    use crate::progress::AnalysisProgressCallback;
    use async_trait::async_trait;
    use base64::Engine;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers requests in call order from a fixed script.
    struct ScriptedModel {
        answers: Vec<String>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(answers: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedModel {
        async fn complete(&self, _request: &VisionRequest) -> Result<String, VerifyError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .get(i)
                .cloned()
                .ok_or_else(|| VerifyError::Internal(format!("no scripted answer for call {i}")))
        }
    }

    /// Answers by looking at the page: dark pages are slow and get `dark`.
    struct BrightnessModel {
        dark: String,
        light: String,
    }

    #[async_trait]
    impl VisionModel for BrightnessModel {
        async fn complete(&self, request: &VisionRequest) -> Result<String, VerifyError> {
            let jpeg = base64::engine::general_purpose::STANDARD
                .decode(&request.image_b64)
                .map_err(|e| VerifyError::Internal(e.to_string()))?;
            let img = image::load_from_memory(&jpeg)
                .map_err(|e| VerifyError::Internal(e.to_string()))?
                .to_rgb8();
            if img.get_pixel(0, 0)[0] < 128 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(self.dark.clone())
            } else {
                Ok(self.light.clone())
            }
        }
    }

    struct FailingModel;

    #[async_trait]
    impl VisionModel for FailingModel {
        async fn complete(&self, _request: &VisionRequest) -> Result<String, VerifyError> {
            Err(VerifyError::UpstreamStatus {
                status: 503,
                body: "model loading".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl AnalysisProgressCallback for RecordingProgress {
        fn on_analysis_start(&self, total_pages: usize) {
            self.events.lock().unwrap().push(format!("start {total_pages}"));
        }
        fn on_page_start(&self, page_num: usize, _total_pages: usize) {
            self.events.lock().unwrap().push(format!("page {page_num}"));
        }
        fn on_page_complete(&self, page_num: usize, _total_pages: usize) {
            self.events.lock().unwrap().push(format!("done {page_num}"));
        }
        fn on_analysis_complete(&self, total_pages: usize) {
            self.events.lock().unwrap().push(format!("end {total_pages}"));
        }
    }

    const FRONT: &str = r#"{"face":"recto","numero_cni":"CI0098765432","nom":"KOUASSI","prenoms":"AYA","date_naissance":"01/01/1990","nationalite":"IVOIRIENNE","date_expiration":"01/01/2030","nni":null,"profession":null,"date_emission":null}"#;
    const BACK: &str = r#"{"face":"verso","numero_cni":null,"nom":null,"prenoms":null,"date_naissance":null,"nationalite":null,"date_expiration":null,"nni":"12121245896","profession":"ENSEIGNANTE","date_emission":"01/01/2020"}"#;

    fn page(index: usize, shade: u8) -> PageImage {
        PageImage {
            index,
            image: RgbImage::from_pixel(16, 16, Rgb([shade, shade, shade])),
        }
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(32, 20, Rgb([200, 180, 160]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    fn analyzer(model: Arc<dyn VisionModel>) -> Analyzer {
        analyzer_with(AnalysisConfig::default(), model)
    }

    fn analyzer_with(config: AnalysisConfig, model: Arc<dyn VisionModel>) -> Analyzer {
        Analyzer::new(config)
            .unwrap()
            .with_vision_model(model)
            .with_jitter(Arc::new(FixedJitter(0)))
    }

    #[tokio::test]
    async fn single_jpeg_front_end_to_end() {
        let a = analyzer(ScriptedModel::new(&[FRONT]));
        let doc = Document::new(jpeg_bytes(), "cni.jpg", DocumentType::IdCard);
        let report = a.analyze(&doc).await.unwrap();

        assert_eq!(report.info["face"].as_deref(), Some("front"));
        assert_eq!(report.info["numero_doc"].as_deref(), Some("CI0098765432"));
        assert_eq!(report.info["nni"], None);
        assert_eq!(report.info["profession"], None);
        assert_eq!(report.info["date_emission"], None);
        // No issuance date, so only the number and birth-date checks pass.
        assert_eq!(report.score, Some(70));
        assert_eq!(report.type_document, "Carte Nationale d'Identité");
        assert_eq!(report.verification_number, 3);
        assert_eq!(report.justify.as_deref(), Some(NON_CONFORMING));
    }

    #[tokio::test]
    async fn front_and_back_pages_fuse_to_full_score() {
        let a = analyzer(ScriptedModel::new(&[FRONT, BACK]));
        let analysis = a
            .analyze_id_card_pages(&[page(0, 200), page(1, 200)])
            .await
            .unwrap();

        assert_eq!(analysis.scored.record.face, Side::Front);
        assert_eq!(analysis.report.score, Some(100));
        assert_eq!(analysis.report.info["nni"].as_deref(), Some("12121245896"));
        assert_eq!(analysis.report.info["nom"].as_deref(), Some("KOUASSI"));
        assert_eq!(analysis.pages.len(), 2);
        assert_eq!(analysis.pages[1].fields.numero_cni, None);
    }

    #[tokio::test]
    async fn contaminated_pages_are_cleaned_before_fusion() {
        // The back page wrongly repeats a longer name; it must not win.
        let back = r#"{"face":"verso","nom":"KOUASSI AYA MARIE","nni":"121"}"#;
        let a = analyzer(ScriptedModel::new(&[FRONT, back]));
        let analysis = a
            .analyze_id_card_pages(&[page(0, 200), page(1, 200)])
            .await
            .unwrap();
        assert_eq!(analysis.scored.record.fields.nom.as_deref(), Some("KOUASSI"));
    }

    #[tokio::test]
    async fn malformed_answer_degrades_instead_of_failing() {
        let a = analyzer(ScriptedModel::new(&["Je ne vois pas de carte."]));
        let analysis = a.analyze_id_card_pages(&[page(0, 200)]).await.unwrap();

        assert_eq!(analysis.scored.record.face, Side::Unknown);
        assert!(analysis.scored.record.fields.is_empty());
        assert_eq!(analysis.report.score, Some(0));
        assert_eq!(analysis.report.info["face"].as_deref(), Some("unknown"));
    }

    #[tokio::test]
    async fn upstream_error_aborts_analysis() {
        let a = analyzer(Arc::new(FailingModel));
        let err = a.analyze_id_card_pages(&[page(0, 200)]).await.unwrap_err();
        assert!(err.is_upstream(), "got {err:?}");
    }

    #[tokio::test]
    async fn unrenderable_document_aborts_before_extraction() {
        let model = ScriptedModel::new(&[FRONT]);
        let a = analyzer(model.clone());
        let doc = Document::new(b"not an image".to_vec(), "scan.png", DocumentType::IdCard);
        let err = a.analyze(&doc).await.unwrap_err();
        assert!(matches!(err, VerifyError::UnrenderableDocument { .. }), "got {err:?}");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_extraction_keeps_page_order() {
        let dark = r#"{"face":"recto","nom":"PREMIER"}"#;
        let light = r#"{"face":"recto","nom":"SECOND"}"#;
        let model = Arc::new(BrightnessModel {
            dark: dark.into(),
            light: light.into(),
        });
        let config = AnalysisConfig::builder().concurrency(4).build().unwrap();
        let a = analyzer_with(config, model);

        // Page 1 answers last but must stay first.
        let analysis = a
            .analyze_id_card_pages(&[page(0, 10), page(1, 240)])
            .await
            .unwrap();
        assert_eq!(analysis.pages[0].fields.nom.as_deref(), Some("PREMIER"));
        assert_eq!(analysis.pages[1].fields.nom.as_deref(), Some("SECOND"));
        // Same length, so the first page in order wins.
        assert_eq!(analysis.scored.record.fields.nom.as_deref(), Some("PREMIER"));
    }

    #[tokio::test]
    async fn progress_events_follow_pages() {
        let progress = Arc::new(RecordingProgress::default());
        let config = AnalysisConfig::builder()
            .progress_callback(progress.clone())
            .build()
            .unwrap();
        let a = analyzer_with(config, ScriptedModel::new(&[FRONT, BACK]));
        a.analyze_id_card_pages(&[page(0, 200), page(1, 200)])
            .await
            .unwrap();

        let events = progress.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["start 2", "page 1", "done 1", "page 2", "done 2", "end 2"]
        );
    }

    #[tokio::test]
    async fn field_table_lists_every_field_per_page() {
        let a = analyzer(ScriptedModel::new(&[FRONT, BACK]));
        let analysis = a
            .analyze_id_card_pages(&[page(0, 200), page(1, 200)])
            .await
            .unwrap();
        let table = analysis.field_table();

        assert_eq!(table.len(), IdCardFields::ALL.len());
        assert_eq!(table[0].field, "numero_cni");
        let nni = table.iter().find(|r| r.field == "nni").unwrap();
        assert_eq!(nni.fused.as_deref(), Some("12121245896"));
        assert_eq!(nni.pages, vec![None, Some("12121245896".to_string())]);
    }

    #[tokio::test]
    async fn passport_reads_first_page_only() {
        let answer = r#"{
            "analyse_securite": {"document_complet": true, "alertes": []},
            "donnees_titulaire": {"nom": "KONE", "prenoms": "AWA", "date_naissance": "12/03/1985"},
            "donnees_document": {"passeport_no": "20AB12345", "date_expiration": "01/02/2030"}
        }"#;
        let model = ScriptedModel::new(&[answer]);
        let a = analyzer(model.clone());
        let analysis = a
            .analyze_passport_pages(&[page(0, 200), page(1, 200)])
            .await
            .unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let report = analysis.report;
        assert_eq!(report.score, Some(99));
        assert_eq!(report.type_document, "Passeport");
        assert_eq!(report.info.len(), 5);
        assert_eq!(report.info["numero_doc"].as_deref(), Some("20AB12345"));
        assert_eq!(report.info["nom"].as_deref(), Some("KONE"));
        assert_eq!(report.justify.as_deref(), Some(NON_CONFORMING));
        assert_eq!(analysis.scored.record.security.document_complet, Some(true));
    }

    #[tokio::test]
    async fn low_threshold_accepts() {
        let config = AnalysisConfig::builder().score_threshold(2).build().unwrap();
        let a = analyzer_with(config, ScriptedModel::new(&[FRONT]));
        let analysis = a.analyze_id_card_pages(&[page(0, 200)]).await.unwrap();
        assert_eq!(
            analysis.report.justify.as_deref(),
            Some(acceptance_message(DocumentType::IdCard))
        );
    }

    #[test]
    fn analyze_sync_runs_outside_a_runtime() {
        let config = AnalysisConfig::builder()
            .vision_base_url("http://127.0.0.1:9")
            .request_timeout_secs(2)
            .build()
            .unwrap();
        let doc = Document::new(jpeg_bytes(), "cni.jpeg", DocumentType::IdCard);
        let err = analyze_sync(&doc, &config).unwrap_err();
        assert!(err.is_upstream(), "got {err:?}");
    }
}
