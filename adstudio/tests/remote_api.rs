mod support;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use adstudio::prompt::PROMPT_ENGINEER_INSTRUCTIONS;
use adstudio::{
    BackgroundStripper, CampaignRunner, Error, GeminiPromptSynthesizer, ImagenSceneGenerator,
    ProductCutout, PromptSynthesizer, SceneGenerator, Theme, ThemeCatalog,
    VertexForegroundStripper,
};

use support::{
    build_gemini_client, build_vertex_client, encode_png, encode_png_base64, product_png,
    product_rgba, vertex_model_path, write_product, TEST_TOKEN,
};

fn gemini_text_response(text: &str) -> Value {
    json!({
        "candidates": [
            {
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }
        ]
    })
}

fn imagen_response(image: DynamicImage) -> Value {
    json!({
        "predictions": [
            {"bytesBase64Encoded": encode_png_base64(image), "mimeType": "image/png"}
        ]
    })
}

fn sky_scene() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([40, 90, 200])))
}

#[tokio::test]
async fn test_gemini_synthesizer_sends_image_instructions_and_theme() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash-002:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            let parts = body["contents"][0]["parts"].as_array().unwrap().clone();
            let ok = body["contents"][0]["role"] == "user"
                && parts.len() == 3
                && parts[0]["inlineData"]["mimeType"] == "image/png"
                && parts[0]["inlineData"]["data"].as_str().is_some_and(|data| !data.is_empty())
                && parts[1]["text"] == PROMPT_ENGINEER_INSTRUCTIONS
                && parts[2]["text"] == "Theme: Neo-Tokyo Cyberpunk\nMood: neon rain";
            if ok {
                ResponseTemplate::new(200).set_body_json(gemini_text_response(
                    "  The perfume bottle, rain-soaked neon street, magenta rim light, low angle, octane render\n",
                ))
            } else {
                ResponseTemplate::new(400).set_body_string("unexpected request body")
            }
        })
        .expect(1)
        .mount(&mock_server)
        .await;

    let synthesizer = GeminiPromptSynthesizer::new(build_gemini_client(&mock_server.uri()));
    let cutout = ProductCutout::new(product_rgba()).unwrap();
    let theme = Theme::new("Neo-Tokyo Cyberpunk", "neon rain", "Innovation");

    let prompt = synthesizer.synthesize(&cutout, &theme).await.unwrap();
    assert_eq!(
        prompt,
        "The perfume bottle, rain-soaked neon street, magenta rim light, low angle, octane render"
    );
}

#[tokio::test]
async fn test_gemini_synthesizer_blocked_prompt_is_empty_prompt_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash-002:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&mock_server)
        .await;

    let synthesizer = GeminiPromptSynthesizer::new(build_gemini_client(&mock_server.uri()));
    let cutout = ProductCutout::new(product_rgba()).unwrap();
    let theme = Theme::new("Midnight Luxury", "black marble", "Exclusivity");

    let err = synthesizer.synthesize(&cutout, &theme).await.unwrap_err();
    match err {
        Error::EmptyPrompt { message } => assert!(message.contains("Safety"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_gemini_synthesizer_uses_configured_model_on_vertex() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("gemini-2.0-flash", "generateContent")))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_text_response("A mug, oak table")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let synthesizer = GeminiPromptSynthesizer::new(build_vertex_client(&mock_server.uri()))
        .with_model("gemini-2.0-flash");
    let cutout = ProductCutout::new(product_rgba()).unwrap();
    let theme = Theme::new("Cabin", "warm wood", "Comfort");

    assert_eq!(
        synthesizer.synthesize(&cutout, &theme).await.unwrap(),
        "A mug, oak table"
    );
}

#[tokio::test]
async fn test_imagen_generator_request_parameters() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("imagen-3.0-generate-001", "predict")))
        .and(body_partial_json(json!({
            "instances": [{"prompt": "The bottle, black marble, gold rim light"}],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": "1:1",
                "safetySetting": "BLOCK_MEDIUM_AND_ABOVE",
                "personGeneration": "ALLOW_ADULT",
                "includeRaiReason": true
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(imagen_response(sky_scene())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scenes = ImagenSceneGenerator::new(build_vertex_client(&mock_server.uri()));
    let scene = scenes
        .generate("The bottle, black marble, gold rim light")
        .await
        .unwrap();
    assert_eq!((scene.width(), scene.height()), (32, 32));
    assert_eq!(scene.to_rgb8().get_pixel(5, 5), &Rgb([40, 90, 200]));
}

#[tokio::test]
async fn test_imagen_generator_filtered_reason() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("imagen-3.0-generate-001", "predict")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"raiFilteredReason": "The prompt contained sensitive words."}]
        })))
        .mount(&mock_server)
        .await;

    let scenes = ImagenSceneGenerator::new(build_vertex_client(&mock_server.uri()));
    let err = scenes.generate("anything").await.unwrap_err();
    assert!(matches!(err, Error::SceneFiltered { reason } if reason.contains("sensitive")));
}

#[tokio::test]
async fn test_imagen_generator_no_predictions() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("imagen-3.0-generate-001", "predict")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let scenes = ImagenSceneGenerator::new(build_vertex_client(&mock_server.uri()));
    let err = scenes.generate("anything").await.unwrap_err();
    assert!(matches!(err, Error::NoImageGenerated));
}

#[tokio::test]
async fn test_imagen_generator_api_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("imagen-3.0-generate-001", "predict")))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&mock_server)
        .await;

    let scenes = ImagenSceneGenerator::new(build_vertex_client(&mock_server.uri()));
    let err = scenes.generate("anything").await.unwrap_err();
    assert!(matches!(err, Error::ApiError { status: 500, message } if message == "backend exploded"));
}

#[tokio::test]
async fn test_imagen_generator_gemini_backend_path_and_ratio() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/imagen-3.0-fast-generate-001:predict"))
        .and(body_partial_json(json!({"parameters": {"aspectRatio": "16:9"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(imagen_response(sky_scene())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scenes = ImagenSceneGenerator::new(build_gemini_client(&mock_server.uri()))
        .with_model("imagen-3.0-fast-generate-001")
        .with_aspect_ratio("16:9");
    assert!(scenes.generate("a beach").await.is_ok());
}

#[tokio::test]
async fn test_vertex_stripper_applies_foreground_mask() {
    let mock_server = MockServer::start().await;
    // Half-size mask: left half background, right half foreground.
    let mask = GrayImage::from_fn(20, 40, |x, _| if x < 10 { Luma([0]) } else { Luma([255]) });
    Mock::given(method("POST"))
        .and(path(vertex_model_path("image-segmentation-001", "predict")))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(body_partial_json(json!({"parameters": {"mode": "FOREGROUND"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{
                "bytesBase64Encoded": encode_png_base64(DynamicImage::ImageLuma8(mask)),
                "mimeType": "image/png"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let photo = RgbaImage::from_pixel(40, 80, Rgba([200, 200, 200, 255]));
    let raw = encode_png(DynamicImage::ImageRgba8(photo));
    let stripper = VertexForegroundStripper::new(build_vertex_client(&mock_server.uri()));
    let cutout = stripper.strip(&raw).await.unwrap();

    assert_eq!(cutout.dimensions(), (40, 80));
    assert_eq!(cutout.get_pixel(2, 40)[3], 0);
    assert_eq!(cutout.get_pixel(37, 40)[3], 255);
    assert_eq!(cutout.get_pixel(37, 40)[0], 200);
}

#[tokio::test]
async fn test_vertex_stripper_without_mask_fails() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("image-segmentation-001", "predict")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
        .mount(&mock_server)
        .await;

    let stripper = VertexForegroundStripper::new(build_vertex_client(&mock_server.uri()));
    let err = stripper.strip(&product_png()).await.unwrap_err();
    assert!(matches!(err, Error::NoMask));
}

#[tokio::test]
async fn test_vertex_stripper_rejects_gemini_backend() {
    let stripper = VertexForegroundStripper::new(build_gemini_client("http://127.0.0.1:9"));
    let err = stripper.strip(&product_png()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[tokio::test]
async fn test_campaign_against_vertex_endpoints() {
    let mock_server = MockServer::start().await;
    let full_mask = GrayImage::from_pixel(40, 80, Luma([255]));
    Mock::given(method("POST"))
        .and(path(vertex_model_path("image-segmentation-001", "predict")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{
                "bytesBase64Encoded": encode_png_base64(DynamicImage::ImageLuma8(full_mask))
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("gemini-1.5-flash-002", "generateContent")))
        .respond_with(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            let theme = body["contents"][0]["parts"][2]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let prompt = if theme.contains("Lagoon") {
                "The can, turquoise lagoon, midday sun, eye level, photorealistic"
            } else {
                "The can, snowy ridge, blue hour, low angle, 8k"
            };
            ResponseTemplate::new(200).set_body_json(gemini_text_response(prompt))
        })
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("imagen-3.0-generate-001", "predict")))
        .and(body_partial_json(json!({"instances": [{"prompt": "The can, snowy ridge, blue hour, low angle, 8k"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"raiFilteredReason": "filtered"}]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(vertex_model_path("imagen-3.0-generate-001", "predict")))
        .and(body_partial_json(json!({"instances": [{"prompt": "The can, turquoise lagoon, midday sun, eye level, photorealistic"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(imagen_response(sky_scene())))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_product(dir.path());
    let output = dir.path().join("campaign");
    let client = build_vertex_client(&mock_server.uri());
    let runner = CampaignRunner::new(
        Box::new(VertexForegroundStripper::new(client.clone())),
        Box::new(GeminiPromptSynthesizer::new(client.clone())),
        Box::new(ImagenSceneGenerator::new(client)),
        &output,
    );
    let catalog = ThemeCatalog::new(vec![
        Theme::new("Summit", "snow and ice", "Endurance"),
        Theme::new("Lagoon", "tropical water", "Refreshment"),
    ])
    .unwrap();

    let report = runner.run(&input, &catalog).await.unwrap();
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!output.join("output_0_Endurance.png").exists());
    assert!(output.join("output_1_Refreshment.png").exists());
    assert_eq!(
        std::fs::read_to_string(output.join("manifest.txt")).unwrap(),
        "FILE: output_1_Refreshment.png\nPROMPT: The can, turquoise lagoon, midday sun, eye level, photorealistic\n"
    );
}
