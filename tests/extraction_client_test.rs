use card_scanner::adapters::openai::{OpenAiExtractor, EXTRACTION_PROMPT, NO_DATA_MESSAGE};
use card_scanner::domain::model::CardImages;
use card_scanner::domain::ports::CardExtractor;
use card_scanner::CardError;
use httpmock::prelude::*;
use reqwest::Client;
use serde_json::json;

fn extractor(server: &MockServer) -> OpenAiExtractor {
    OpenAiExtractor::new(Client::new(), server.base_url(), "gpt-4o", "sk-test")
}

fn completion(content: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn expected_request(images: &[&str]) -> serde_json::Value {
    let mut content = vec![json!({"type": "text", "text": EXTRACTION_PROMPT})];
    content.extend(
        images
            .iter()
            .map(|url| json!({"type": "image_url", "image_url": {"url": url}})),
    );

    json!({
        "model": "gpt-4o",
        "response_format": {"type": "json_object"},
        "messages": [{"role": "user", "content": content}]
    })
}

#[tokio::test]
async fn test_front_only_sends_one_image() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("authorization", "Bearer sk-test")
            .json_body(expected_request(&["https://cards.test/front.jpg"]));
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion(json!(
                r#"{"organization": "Acme", "name": "Jo", "designation": "CTO", "contact": "555-0100", "email": "jo@acme.test", "website": "acme.test", "address": "1 Main St", "remarks": ""}"#
            )));
    });

    let record = extractor(&server)
        .extract(&CardImages::new("https://cards.test/front.jpg", None))
        .await
        .unwrap();

    api_mock.assert();
    assert_eq!(record.organization, "Acme");
    assert_eq!(record.name, "Jo");
    assert_eq!(record.designation, "CTO");
    assert_eq!(record.email, "jo@acme.test");
    assert_eq!(record.remarks, "");
}

#[tokio::test]
async fn test_front_and_back_sent_in_order() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions").json_body(expected_request(&[
            "data:image/jpeg;base64,RlJPTlQ=",
            "data:image/jpeg;base64,QkFDSw==",
        ]));
        then.status(200)
            .json_body(completion(json!(r#"{"name": "Jo", "address": "Back side"}"#)));
    });

    let images = CardImages::new(
        "data:image/jpeg;base64,RlJPTlQ=",
        Some("data:image/jpeg;base64,QkFDSw==".to_string()),
    );
    let record = extractor(&server).extract(&images).await.unwrap();

    api_mock.assert();
    assert_eq!(record.name, "Jo");
    assert_eq!(record.address, "Back side");
    // 缺少的欄位補上空字串
    assert_eq!(record.website, "");
}

#[tokio::test]
async fn test_missing_front_image_makes_no_request() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(completion(json!("{}")));
    });

    let client = extractor(&server);
    let empty = client.extract(&CardImages::new("", None)).await;
    let absent = client.extract(&CardImages::default()).await;

    api_mock.assert_hits(0);
    assert!(matches!(empty, Err(CardError::InvalidInput { .. })));
    assert!(matches!(absent, Err(CardError::InvalidInput { .. })));
}

#[tokio::test]
async fn test_null_content_is_extraction_failure() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(completion(serde_json::Value::Null));
    });

    let err = extractor(&server)
        .extract(&CardImages::new("https://cards.test/front.jpg", None))
        .await
        .unwrap_err();

    api_mock.assert();
    assert!(matches!(err, CardError::ExtractionFailed { .. }));
    assert_eq!(err.to_string(), NO_DATA_MESSAGE);
}

#[tokio::test]
async fn test_no_choices_is_extraction_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({"choices": []}));
    });

    let err = extractor(&server)
        .extract(&CardImages::new("https://cards.test/front.jpg", None))
        .await
        .unwrap_err();

    assert!(matches!(err, CardError::ExtractionFailed { .. }));
}

#[tokio::test]
async fn test_prose_reply_is_extraction_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(completion(json!(
            "Here is the contact: ```json {\"name\": \"Jo\"} ```"
        )));
    });

    let err = extractor(&server)
        .extract(&CardImages::new("https://cards.test/front.jpg", None))
        .await
        .unwrap_err();

    assert!(matches!(err, CardError::ExtractionFailed { .. }));
    assert!(err.to_string().starts_with("OpenAI API call failed"));
}

#[tokio::test]
async fn test_api_error_status_is_extraction_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(401)
            .json_body(json!({"error": {"message": "Incorrect API key provided"}}));
    });

    let err = extractor(&server)
        .extract(&CardImages::new("https://cards.test/front.jpg", None))
        .await
        .unwrap_err();

    assert!(matches!(err, CardError::ExtractionFailed { .. }));
    assert!(err.to_string().contains("401"));
    assert!(err.to_string().contains("Incorrect API key"));
}

#[tokio::test]
async fn test_unknown_fields_are_dropped() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(completion(json!(
            r#"{"name": "Jo", "contact": 5550100, "fax": "555-0199", "social": {"x": "@jo"}}"#
        )));
    });

    let record = extractor(&server)
        .extract(&CardImages::new("https://cards.test/front.jpg", None))
        .await
        .unwrap();

    let value = serde_json::to_value(&record).unwrap();
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();

    assert_eq!(keys.len(), 8);
    assert!(value.get("fax").is_none());
    assert_eq!(record.contact, "5550100");
}
