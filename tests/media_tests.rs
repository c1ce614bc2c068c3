use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pretty_assertions::assert_eq;
use serde_json::json;
use stryde::config::StrydeConfig;
use stryde::error::StrydeError;
use stryde::provider::{GeminiClient, InlineData, VideoRequest};
use stryde::util::retry::RetryPolicy;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> GeminiClient {
    let config = StrydeConfig::new()
        .with_api_key("test-key")
        .with_base_url(server.uri());
    GeminiClient::new(&config)
        .expect("client should build")
        .with_retry_policy(RetryPolicy::none())
        .with_video_poll_interval(std::time::Duration::from_millis(5))
}

#[tokio::test]
async fn image_generation_decodes_the_first_prediction() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/imagen-4.0-generate-001:predict"))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("\"aspectRatio\":\"16:9\""))
        .and(body_string_contains("sunrise run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{
                "bytesBase64Encoded": BASE64.encode(b"jpeg-bytes"),
                "mimeType": "image/jpeg"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let media = client
        .generate_image("imagen-4.0-generate-001", "sunrise run", "16:9")
        .await
        .expect("image generation should succeed");

    assert_eq!(media.mime_type, "image/jpeg");
    assert_eq!(media.bytes, b"jpeg-bytes");
}

#[tokio::test]
async fn image_generation_without_predictions_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/imagen-4.0-generate-001:predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "predictions": [] })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .generate_image("imagen-4.0-generate-001", "prompt", "1:1")
        .await
        .expect_err("empty predictions should fail");
    assert!(matches!(err, StrydeError::Api { .. }));
}

#[tokio::test]
async fn image_edit_returns_the_inline_part() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash-image:generateContent"))
        .and(body_string_contains("\"responseModalities\":[\"IMAGE\"]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [
                    { "inlineData": {
                        "mimeType": "image/png",
                        "data": BASE64.encode(b"edited")
                    }}
                ]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let source = InlineData {
        mime_type: "image/jpeg".into(),
        data: BASE64.encode(b"original"),
    };
    let media = client
        .edit_image("gemini-2.5-flash-image", source, "add a finish line")
        .await
        .expect("edit should succeed");

    assert_eq!(media.mime_type, "image/png");
    assert_eq!(media.bytes, b"edited");
}

#[tokio::test]
async fn image_edit_without_image_data_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash-image:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "cannot edit" }] } }]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let source = InlineData {
        mime_type: "image/jpeg".into(),
        data: BASE64.encode(b"original"),
    };
    let err = client
        .edit_image("gemini-2.5-flash-image", source, "prompt")
        .await
        .expect_err("missing image data should fail");
    assert!(matches!(err, StrydeError::Api { .. }));
}

#[tokio::test]
async fn speech_synthesis_requests_audio_and_decodes_pcm() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash-preview-tts:generateContent"))
        .and(body_string_contains("\"responseModalities\":[\"AUDIO\"]"))
        .and(body_string_contains("\"voiceName\":\"Kore\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [
                    { "inlineData": {
                        "mimeType": "audio/pcm;rate=24000",
                        "data": BASE64.encode([0u8, 0, 0, 64])
                    }}
                ]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let media = client
        .synthesize_speech("gemini-2.5-flash-preview-tts", "Great job!", "Kore")
        .await
        .expect("speech synthesis should succeed");

    assert_eq!(media.mime_type, "audio/pcm;rate=24000");
    assert_eq!(media.bytes, vec![0, 0, 0, 64]);
}

#[tokio::test]
async fn video_generation_polls_until_done_and_downloads() {
    let server = MockServer::start().await;
    let operation = "models/veo-3.1-fast-generate-preview/operations/op-123";
    let video_uri = format!("{}/files/final.mp4", server.uri());

    Mock::given(method("POST"))
        .and(path(
            "/models/veo-3.1-fast-generate-preview:predictLongRunning",
        ))
        .and(body_string_contains("\"aspectRatio\":\"9:16\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "name": operation })),
        )
        .expect(1)
        .mount(&server)
        .await;

    // First poll: still running. Second poll: done with a download link.
    Mock::given(method("GET"))
        .and(path(format!("/{operation}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": false })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{operation}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{ "video": { "uri": video_uri } }]
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/final.mp4"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let request = VideoRequest::new("victory lap", "9:16");
    let bytes = client
        .generate_video("veo-3.1-fast-generate-preview", &request)
        .await
        .expect("video generation should succeed");

    assert_eq!(bytes, b"mp4-bytes");
}

#[tokio::test]
async fn video_generation_without_a_link_after_done_is_an_error() {
    let server = MockServer::start().await;
    let operation = "models/veo-3.1-fast-generate-preview/operations/op-404";

    Mock::given(method("POST"))
        .and(path(
            "/models/veo-3.1-fast-generate-preview:predictLongRunning",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "name": operation })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{operation}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "done": true, "response": {} })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .generate_video(
            "veo-3.1-fast-generate-preview",
            &VideoRequest::new("prompt", "16:9"),
        )
        .await
        .expect_err("missing link should fail");
    assert!(
        matches!(err, StrydeError::Api { ref message, .. } if message.contains("no download link"))
    );
}

#[tokio::test]
async fn video_request_carries_the_reference_image() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/models/veo-3.1-fast-generate-preview:predictLongRunning",
        ))
        .and(body_string_contains("bytesBase64Encoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let request = VideoRequest::new("animate this", "16:9").with_reference_image(InlineData {
        mime_type: "image/jpeg".into(),
        data: BASE64.encode(b"selfie"),
    });

    // The operation name is missing, so the call fails after the start
    // request; the matcher above is what this test is about.
    let err = client
        .generate_video("veo-3.1-fast-generate-preview", &request)
        .await
        .expect_err("missing operation name should fail");
    assert!(matches!(err, StrydeError::Api { .. }));
}
