use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use httpmock::{Method::POST, MockServer};
use ragdex::{
    api,
    config::Config,
    processing::{ChunkStatus, FailureStage, SourceDocument, identifiers::build_parent_id},
    service::{RagApi, RagService},
};
use serde_json::json;
use tower::ServiceExt;

fn config_for(server: &MockServer) -> Config {
    let base = server.base_url();
    let values: HashMap<&str, String> = HashMap::from([
        ("AZURE_OPENAI_ENDPOINT", base.clone()),
        ("AZURE_OPENAI_API_VERSION", "2024-06-01".to_string()),
        ("AZURE_OPENAI_EMBEDDING_MODEL", "embed".to_string()),
        ("AZURE_OPENAI_GENERATIVE_MODEL", "chat".to_string()),
        ("AZURE_OPENAI_API_KEY", "openai-key".to_string()),
        ("AZURE_SEARCH_ENDPOINT", base),
        ("AZURE_SEARCH_INDEX_NAME", "docs".to_string()),
        ("AZURE_SEARCH_API_KEY", "search-key".to_string()),
        ("EMBEDDING_DIMENSION", "3".to_string()),
    ]);
    Config::from_source(|key| values.get(key).cloned()).expect("valid test config")
}

async fn mock_embeddings(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/deployments/embed/embeddings")
                .header("api-key", "openai-key");
            then.status(200)
                .json_body(json!({ "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }] }));
        })
        .await
}

async fn mock_index_result<'a>(
    server: &'a MockServer,
    chunk_id: &str,
    accepted: bool,
) -> httpmock::Mock<'a> {
    let marker = format!("\"chunk_id\":\"{chunk_id}\"");
    let result = if accepted {
        json!({ "key": chunk_id, "status": true, "errorMessage": null, "statusCode": 201 })
    } else {
        json!({ "key": chunk_id, "status": false, "errorMessage": "Document is too large", "statusCode": 400 })
    };
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/indexes/docs/docs/index")
                .query_param("api-version", "2024-07-01")
                .header("api-key", "search-key")
                .body_contains(marker.as_str());
            then.status(200).json_body(json!({ "value": [result] }));
        })
        .await
}

#[tokio::test]
async fn markdown_document_flows_through_every_stage() {
    let server = MockServer::start_async().await;
    let parent = build_parent_id("guides/setup.md");
    let embeddings = mock_embeddings(&server).await;
    let first = mock_index_result(&server, &format!("{parent}0"), true).await;
    let second = mock_index_result(&server, &format!("{parent}1"), true).await;

    let service = RagService::from_config(&config_for(&server)).expect("service");
    let document = SourceDocument::new(
        "guides/setup.md",
        "https://blob/guides/setup.md",
        b"# Setup\nInstall it.\n## Linux\nUse apt.\n".to_vec(),
    );
    let report = service.ingest(document).await.expect("run succeeds");

    embeddings.assert_hits_async(2).await;
    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(report.parent_id.as_deref(), Some(parent.as_str()));
    assert_eq!(report.indexed_count(), 2);
    assert_eq!(service.metrics_snapshot().chunks_indexed, 2);
}

#[tokio::test]
async fn rejected_chunk_is_reported_while_others_succeed() {
    let server = MockServer::start_async().await;
    let parent = build_parent_id("big.md");
    mock_embeddings(&server).await;
    mock_index_result(&server, &format!("{parent}0"), false).await;
    let second = mock_index_result(&server, &format!("{parent}1"), true).await;

    let service = RagService::from_config(&config_for(&server)).expect("service");
    let document = SourceDocument::new(
        "big.md",
        "https://blob/big.md",
        b"# One\nfirst\n# Two\nsecond".to_vec(),
    );
    let report = service.ingest(document).await.expect("run succeeds");

    second.assert_async().await;
    assert_eq!(report.chunks.len(), 2);
    match &report.chunks[0].status {
        ChunkStatus::Failed { stage, message } => {
            assert_eq!(*stage, FailureStage::Indexing);
            assert!(message.contains("Document is too large"));
        }
        other => panic!("unexpected status: {other:?}"),
    }
    assert!(report.chunks[1].is_indexed());

    let snapshot = service.metrics_snapshot();
    assert_eq!(snapshot.chunks_indexed, 1);
    assert_eq!(snapshot.chunks_failed, 1);
}

#[tokio::test]
async fn chat_route_streams_answer_grounded_in_search_hits() {
    let server = MockServer::start_async().await;
    mock_embeddings(&server).await;
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/indexes/docs/docs/search")
                .body_contains("\"search\":\"How much leave?\"");
            then.status(200).json_body(json!({
                "value": [{
                    "title": "hr.pdf",
                    "chunk": "Employees get 20 days.",
                    "url": "https://blob/hr.pdf"
                }]
            }));
        })
        .await;
    let completion = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/deployments/chat/chat/completions")
                .body_contains("File: hr.pdf, Content: Employees get 20 days.");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"20 days.\"}}]}\n\n",
                    "data: [DONE]\n\n",
                ));
        })
        .await;

    let service = RagService::from_config(&config_for(&server)).expect("service");
    let app = api::create_router(Arc::new(service));
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/chat")
                .body(Body::from(r#"{"query":"How much leave?"}"#))
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = String::from_utf8(body.to_vec()).expect("utf8");
    search.assert_async().await;
    completion.assert_async().await;
    assert!(body.contains("data: 20 days."));
}

#[tokio::test]
async fn ingest_route_answers_500_for_undecodable_text() {
    let server = MockServer::start_async().await;
    let service = RagService::from_config(&config_for(&server)).expect("service");
    let app = api::create_router(Arc::new(service));

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/ingest?name=broken.txt&url=https://blob/broken.txt")
                .body(Body::from(vec![0xff, 0xfe, 0x00]))
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
