use std::sync::Once;

use ragdex::{
    config,
    embedding::{AzureOpenAiEmbeddingClient, EmbeddingClient},
    processing::SourceDocument,
    search::{AzureSearchService, IndexReader, SearchQuery},
    service::{RagApi, RagService},
};

static INIT: Once = Once::new();

fn init_config_once() {
    INIT.call_once(config::init_config);
}

#[tokio::test]
#[ignore = "Requires live Azure OpenAI embeddings"]
async fn live_embedding_matches_configured_dimension() {
    init_config_once();
    let config = config::get_config();
    let client = AzureOpenAiEmbeddingClient::new(config).expect("embedding client");
    let vector = client
        .embed("ragdex live embedding")
        .await
        .expect("failed to request embedding from provider");
    assert_eq!(vector.len(), config.embedding_dimension, "embedding dimension mismatch");
}

#[tokio::test]
#[ignore = "Requires live Azure OpenAI and Azure AI Search"]
async fn live_ingest_then_search_finds_chunk() {
    init_config_once();
    let config = config::get_config();
    let service = RagService::from_config(config).expect("service");
    let document = SourceDocument::new(
        "ragdex-live/smoke.md",
        "https://example.invalid/ragdex-live/smoke.md",
        b"# Smoke test\nThe ragdex smoke test marker is purple-otter-42.\n".to_vec(),
    );
    let report = service.ingest(document).await.expect("ingestion run");
    assert_eq!(report.failed_count(), 0, "chunks failed: {report:?}");

    let embedder = AzureOpenAiEmbeddingClient::new(config).expect("embedding client");
    let vector = embedder
        .embed("purple-otter-42")
        .await
        .expect("query embedding");
    let search = AzureSearchService::new(config).expect("search client");
    let hits = search
        .search(&SearchQuery {
            text: "purple-otter-42".into(),
            vector,
            k_nearest: config.search_k_nearest,
            top: config.search_top,
        })
        .await
        .expect("search");
    assert!(
        hits.iter().any(|hit| hit.title == "smoke.md"),
        "smoke document should be retrievable: {hits:?}"
    );
}
