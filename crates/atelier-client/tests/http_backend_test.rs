//! HTTP backend against a mock content API.

use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atelier_client::{ClientConfig, HttpBackend};
use atelier_core::{ContentRecord, DocumentRef, EntitySource, Error, MediaFile, PersistenceAdapter};
use atelier_editor::extract_location;

fn backend(server: &MockServer, token: Option<&str>) -> HttpBackend {
    let config = ClientConfig {
        base_url: format!("{}/api", server.uri()),
        api_token: token.map(str::to_string),
        timeout_secs: 5,
        upload_timeout_secs: 5,
    };
    HttpBackend::new(config).expect("Failed to create backend")
}

fn png(name: &str) -> MediaFile {
    MediaFile::new(
        name,
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13],
    )
}

#[tokio::test]
async fn test_get_document_plain_and_enveloped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/works/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Acme", "year": 2024})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/documents/works/nova"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"title": "Nova"}})))
        .mount(&server)
        .await;

    let backend = backend(&server, None);

    let acme = backend
        .get_document(&DocumentRef::new("works", "acme"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(acme.get("title"), Some(&json!("Acme")));
    assert_eq!(acme.get("year"), Some(&json!(2024)));

    let nova = backend
        .get_document(&DocumentRef::new("works", "nova"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nova.get("title"), Some(&json!("Nova")));
    assert!(!nova.contains_key("data"));
}

#[tokio::test]
async fn test_record_with_data_member_loads_whole() {
    let server = MockServer::start().await;
    let stored = json!({"title": "Acme", "data": ["a.png", "b.png"]});
    Mock::given(method("GET"))
        .and(path("/api/documents/works/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&stored))
        .mount(&server)
        .await;

    let record = backend(&server, None)
        .get_document(&DocumentRef::new("works", "acme"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.into_value(), stored);
}

#[tokio::test]
async fn test_missing_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/works/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/documents/works/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let backend = backend(&server, None);
    assert!(backend
        .get_document(&DocumentRef::new("works", "gone"))
        .await
        .unwrap()
        .is_none());
    assert!(backend
        .get_document(&DocumentRef::new("works", "empty"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_document_ids_are_path_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/works/acme%20rebrand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Acme"})))
        .expect(1)
        .mount(&server)
        .await;

    let record = backend(&server, None)
        .get_document(&DocumentRef::new("works", "acme rebrand"))
        .await
        .unwrap();
    assert!(record.is_some());
}

#[tokio::test]
async fn test_save_sends_record_with_bearer_token() {
    let server = MockServer::start().await;
    let record = ContentRecord::new()
        .with("title", json!("Acme"))
        .with("gallery", json!(["a.png"]));

    Mock::given(method("PUT"))
        .and(path("/api/documents/works/acme"))
        .and(header("Authorization", "Bearer secret-token"))
        .and(body_json(json!({"title": "Acme", "gallery": ["a.png"]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server, Some("secret-token"))
        .save_document(&DocumentRef::new("works", "acme"), &record)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_save_carries_server_reason() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/documents/works/acme"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Slug already taken"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/documents/works/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = backend(&server, None);
    let record = ContentRecord::new().with("title", json!("Acme"));

    let err = backend
        .save_document(&DocumentRef::new("works", "acme"), &record)
        .await
        .unwrap_err();
    match &err {
        Error::Rejected { status, reason } => {
            assert_eq!(*status, 422);
            assert_eq!(reason.as_deref(), Some("Slug already taken"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(err.user_message(), "Slug already taken");

    let err = backend
        .save_document(&DocumentRef::new("works", "broken"), &record)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rejected { status: 500, reason: None }));
}

#[tokio::test]
async fn test_upload_posts_multipart_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"cover.png\""))
        .and(body_string_contains("image/png"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"url": "https://cdn.example.com/cover.png"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server, None)
        .upload_media(png("cover.png"))
        .await
        .unwrap();
    assert_eq!(
        extract_location(&response).as_deref(),
        Some("https://cdn.example.com/cover.png")
    );
}

#[tokio::test]
async fn test_upload_rejection_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .respond_with(
            ResponseTemplate::new(413).set_body_json(json!({"error": {"message": "File too large"}})),
        )
        .mount(&server)
        .await;

    let err = backend(&server, None)
        .upload_media(png("huge.png"))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "File too large");
}

#[tokio::test]
async fn test_list_entities_plain_and_enveloped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collections/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "w1", "title": "Acme rebrand", "tags": ["brand"]},
            {"id": "w2", "title": "Nova app", "thumbnail": "https://cdn/n.png"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/collections/case-studies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c1", "title": "Scaling Nova", "category": "product"}]
        })))
        .mount(&server)
        .await;

    let backend = backend(&server, None);

    let works = backend.list_entities("works").await.unwrap();
    assert_eq!(works.len(), 2);
    assert_eq!(works[0].id, "w1");
    assert_eq!(works[0].tags, vec!["brand".to_string()]);
    assert_eq!(works[1].thumbnail.as_deref(), Some("https://cdn/n.png"));

    let studies = backend.list_entities("case-studies").await.unwrap();
    assert_eq!(studies.len(), 1);
    assert_eq!(studies[0].category.as_deref(), Some("product"));
}

#[tokio::test]
async fn test_unreachable_server_is_request_error() {
    let config = ClientConfig {
        base_url: "http://127.0.0.1:9/api".to_string(),
        api_token: None,
        timeout_secs: 2,
        upload_timeout_secs: 2,
    };
    let backend = HttpBackend::new(config).unwrap();
    let err = backend
        .get_document(&DocumentRef::new("works", "acme"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Request(_)));
}
