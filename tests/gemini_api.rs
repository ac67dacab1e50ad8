//! GeminiClient tests against a mock HTTP server.

use futures::StreamExt;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dardasha::chat::config::GeminiConfig;
use dardasha::chat::models::{Message, ModelId, Part};
use dardasha::chat::services::{GeminiClient, GenerationClient, GenerationError, ManifestFile};

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig::new(Some("test-key".to_string()), server.uri()))
}

fn sse_chunk(text: &str) -> String {
    format!(
        "data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":\"{text}\"}}]}}}}]}}\n\n"
    )
}

fn one_shot_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": text}]}}]
    })
}

#[tokio::test]
async fn stream_reply_yields_fragments_in_order() {
    let server = MockServer::start().await;
    let body = format!("{}{}", sse_chunk("Hi"), sse_chunk(" there"));

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let stream = client
        .stream_reply("sys", &[], &[Part::text("Hello")], ModelId::Flash)
        .await
        .unwrap();

    let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
    assert_eq!(fragments, vec!["Hi".to_string(), " there".to_string()]);
}

#[tokio::test]
async fn stream_reply_sends_history_to_the_pro_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_chunk("ok"), "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![
        Message::user(vec![Part::text("سؤال")]),
        Message::assistant_text("جواب"),
    ];
    let client = client_for(&server);
    let stream = client
        .stream_reply("sys", &history, &[Part::text("تابع")], ModelId::Pro)
        .await
        .unwrap();
    let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
    assert_eq!(fragments, vec!["ok".to_string()]);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["system_instruction"]["parts"][0]["text"], "sys");
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(contents[2]["parts"][0]["text"], "تابع");
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = GeminiClient::new(GeminiConfig::new(None, server.uri()));
    let err = client
        .stream_reply("sys", &[], &[Part::text("hi")], ModelId::Flash)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, GenerationError::MissingApiKey));
}

#[tokio::test]
async fn http_error_statuses_map_to_typed_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"error":{"code":400,"message":"invalid argument"}}"#),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .stream_reply("sys", &[], &[Part::text("hi")], ModelId::Flash)
        .await
        .err()
        .unwrap();

    match err {
        GenerationError::Request(detail) => assert_eq!(detail, "invalid argument"),
        other => panic!("expected Request error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_maps_to_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.generate_title("س", "ج").await.unwrap_err();
    assert!(matches!(err, GenerationError::Provider(_)));
}

#[tokio::test]
async fn generate_title_cleans_the_model_output() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(one_shot_body("\"عنوان المحادثة\"\n")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let title = client.generate_title("سؤال", "جواب").await.unwrap();
    assert_eq!(title, "عنوان المحادثة");
}

#[tokio::test]
async fn generate_manifest_parses_array_out_of_prose() {
    let server = MockServer::start().await;

    let raw = "some preamble [ {\"path\":\"a.txt\",\"content\":\"x\"} ] trailing";
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_shot_body(raw)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let manifest = client
        .generate_project_manifest("موقع بسيط", ModelId::Pro)
        .await
        .unwrap();

    assert_eq!(
        manifest,
        vec![ManifestFile {
            path: "a.txt".to_string(),
            content: "x".to_string(),
        }]
    );
}

#[tokio::test]
async fn garbled_manifest_output_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_shot_body("آسف، لا أستطيع")))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate_project_manifest("وصف", ModelId::Flash)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::ManifestParse(_)));
}

#[tokio::test]
async fn generate_speech_decodes_pcm16_samples() {
    let server = MockServer::start().await;

    // Bytes [0x00, 0x01, 0xFF, 0x7F] = samples [256, 32767].
    let body = serde_json::json!({
        "candidates": [{"content": {"parts": [{
            "inlineData": {"mimeType": "audio/pcm", "data": "AAH/fw=="}
        }]}}]
    });
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-preview-tts:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let samples = client.generate_speech("مرحبا").await.unwrap();
    assert_eq!(samples, Some(vec![256, 32767]));
}

#[tokio::test]
async fn generate_speech_without_audio_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_shot_body("نص فقط")))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.generate_speech("مرحبا").await.unwrap(), None);
}
