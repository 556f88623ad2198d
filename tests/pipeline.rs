//! Integration tests for docverify.
//!
//! The vision service is replaced by a `wiremock` server speaking the
//! chat-completions dialect, so these run offline. Inputs are JPEG/PNG images
//! synthesised in memory; no pdfium library is needed.
//!
//! A live test against a real model server and real scans in `./test_cases/`
//! is gated behind `DOCVERIFY_E2E`:
//!   DOCVERIFY_E2E=1 cargo test --test pipeline -- --nocapture

use docverify::{
    analyze, AnalysisConfig, Analyzer, Document, DocumentType, FixedJitter, VerifyError,
};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn scan(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(64, 40, |x, y| Rgb([(x * 4) as u8, (y * 6) as u8, 128]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

async fn vision_server(content: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .mount(&server)
        .await;
    server
}

fn analyzer_for(server: &MockServer) -> Analyzer {
    let config = AnalysisConfig::builder()
        .vision_base_url(server.uri())
        .build()
        .unwrap();
    Analyzer::new(config)
        .unwrap()
        .with_jitter(Arc::new(FixedJitter(0)))
}

const FRONT_ANSWER: &str = "```json\n{\n  \"face\": \"recto\",\n  \"numero_cni\": \"CI0098765432\",\n  \"nom\": \"KOUASSI\",\n  \"prenoms\": \"AYA MARIE\",\n  \"date_naissance\": \"14/07/1992\",\n  \"nationalite\": \"IVOIRIENNE\",\n  \"date_expiration\": \"09/11/2029\",\n  \"nni\": \"999\",\n  \"profession\": null,\n  \"date_emission\": null\n}\n```";

// ── ID card ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn jpeg_front_yields_front_report() {
    let server = vision_server(FRONT_ANSWER).await;
    let doc = Document::new(scan(ImageFormat::Jpeg), "recto.jpg", DocumentType::IdCard);

    let report = analyzer_for(&server).analyze(&doc).await.unwrap();

    assert_eq!(report.info["face"].as_deref(), Some("front"));
    assert_eq!(report.info["numero_doc"].as_deref(), Some("CI0098765432"));
    assert_eq!(report.info["prenoms"].as_deref(), Some("AYA MARIE"));
    // Back-only fields are masked on a front page, even when the model fills them.
    assert_eq!(report.info["nni"], None);
    assert_eq!(report.info["profession"], None);
    assert_eq!(report.info["date_emission"], None);
    assert_eq!(report.score, Some(70));
    assert_eq!(report.verification_number, 3);
    assert_eq!(report.justify.as_deref(), Some("Document Non-Conforme !"));

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let auth = requests[0].headers.get("authorization").unwrap();
    assert_eq!(auth.to_str().unwrap(), "Bearer lm-studio");
}

#[tokio::test]
async fn report_serialises_with_expected_shape() {
    let server = vision_server(FRONT_ANSWER).await;
    let doc = Document::new(scan(ImageFormat::Png), "recto.png", DocumentType::IdCard);

    let report = analyzer_for(&server).analyze(&doc).await.unwrap();
    let value = serde_json::to_value(&report).unwrap();

    let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    for key in [
        "score",
        "type_document",
        "date_analyse",
        "info",
        "verification_number",
        "justify",
    ] {
        assert!(keys.contains(&key), "missing {key} in {keys:?}");
    }
    assert_eq!(value["type_document"], "Carte Nationale d'Identité");
    // "DD/MM/YYYY à HH:MM"
    let date = value["date_analyse"].as_str().unwrap();
    assert_eq!(date.chars().count(), 18, "got {date}");
    assert!(date.contains(" à "));
}

#[tokio::test]
async fn unparseable_model_answer_still_produces_report() {
    let server = vision_server("Je ne peux pas lire ce document.").await;
    let doc = Document::new(scan(ImageFormat::Jpeg), "flou.jpg", DocumentType::IdCard);

    let report = analyzer_for(&server).analyze(&doc).await.unwrap();

    assert_eq!(report.score, Some(0));
    assert_eq!(report.info["face"].as_deref(), Some("unknown"));
    assert!(report
        .info
        .iter()
        .filter(|(k, _)| k.as_str() != "face")
        .all(|(_, v)| v.is_none()));
}

#[tokio::test]
async fn server_error_surfaces_as_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    let doc = Document::new(scan(ImageFormat::Jpeg), "recto.jpg", DocumentType::IdCard);

    let err = analyzer_for(&server).analyze(&doc).await.unwrap_err();
    assert!(matches!(err, VerifyError::UpstreamStatus { status: 502, .. }), "got {err:?}");
    assert!(err.to_string().contains("502"));
}

#[tokio::test]
async fn corrupt_upload_is_unrenderable() {
    let server = vision_server(FRONT_ANSWER).await;
    let doc = Document::new(vec![0xFF, 0xD8, 0x00, 0x01], "recto.jpg", DocumentType::IdCard);

    let err = analyzer_for(&server).analyze(&doc).await.unwrap_err();
    assert!(matches!(err, VerifyError::UnrenderableDocument { .. }), "got {err:?}");
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Passport ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn passport_report_uses_fixed_score() {
    let answer = json!({
        "analyse_securite": {
            "document_complet": "oui",
            "authenticite_probable": "oui",
            "points_de_controle": {"mrz_presente": true, "image_fantome_visible": true},
            "alertes": []
        },
        "donnees_titulaire": {"nom": "KONE", "prenoms": "AWA", "date_naissance": "12/03/1985", "sexe": "F"},
        "donnees_document": {"passeport_no": "20AB12345", "type": "P", "code_pays": "CIV", "date_expiration": "01/02/2030"}
    })
    .to_string();
    let server = vision_server(&answer).await;
    let config = AnalysisConfig::builder()
        .vision_base_url(server.uri())
        .build()
        .unwrap();
    let doc = Document::new(scan(ImageFormat::Jpeg), "passeport.jpg", DocumentType::Passport);

    let report = analyze(&doc, &config).await.unwrap();

    assert_eq!(report.score, Some(99));
    assert_eq!(report.type_document, "Passeport");
    assert_eq!(report.info["numero_doc"].as_deref(), Some("20AB12345"));
    assert_eq!(report.info["date_expiration"].as_deref(), Some("01/02/2030"));
    assert_eq!(report.info.len(), 5);

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    let system = body["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("passeport"), "passport prompt expected");
}

// ── Live ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_id_card_scan() {
    if std::env::var("DOCVERIFY_E2E").is_err() {
        println!("SKIP — set DOCVERIFY_E2E=1 to run against a live vision server");
        return;
    }
    let file = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/cni.jpg");
    if !file.exists() {
        println!("SKIP — test file not found: {}", file.display());
        return;
    }
    let bytes = std::fs::read(&file).unwrap();
    let url = std::env::var("DOCVERIFY_VISION_URL")
        .unwrap_or_else(|_| docverify::config::DEFAULT_VISION_BASE_URL.to_string());
    let config = AnalysisConfig::builder().vision_base_url(url).build().unwrap();

    let report = analyze(&Document::new(bytes, "cni.jpg", DocumentType::IdCard), &config)
        .await
        .unwrap();
    println!("{}", serde_json::to_string_pretty(&report).unwrap());
    assert!(report.score.is_some());
}
