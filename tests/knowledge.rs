//! Document ingestion and retrieval integration tests

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use parley::knowledge::{
    AnyDocumentExtractor, ChunkStore, ChunkingConfig, DocumentExtractor, ExtractError,
    HashEmbedder, PdfExtractor, PlainTextExtractor,
};
use parley::{Capabilities, Config, ConversationOrchestrator, Error, ErrorKind};

mod common;

use common::{
    CountingAudio, Harness, ScriptedCapture, ScriptedGenerator, pdf_document, test_settings,
};

fn menu() -> String {
    [
        "Entrantes: croquetas de jamón, pimientos de padrón y gazpacho.",
        "Principales: paella valenciana, merluza a la gallega y cochinillo.",
        "Postres: flan casero, churros con chocolate y tarta de queso.",
        "Horario: abrimos de martes a domingo, de 13:00 a 23:30.",
    ]
    .join("\n")
}

#[tokio::test]
async fn test_add_list_remove_document() {
    let harness = Harness::new(ScriptedCapture::default(), ScriptedGenerator::default());
    let orchestrator = &harness.orchestrator;

    let doc = assert_ok!(orchestrator.add_document("menu.txt", menu().as_bytes()).await);
    assert_eq!(doc.name, "menu.txt");
    assert_eq!(doc.size_bytes, menu().len());
    assert!(doc.chunk_count > 1);
    assert_eq!(orchestrator.documents(), vec![doc.clone()]);

    assert_ok!(orchestrator.remove_document(doc.id));
    assert!(orchestrator.documents().is_empty());
    assert!(harness.store.is_empty());

    let missing = assert_err!(orchestrator.remove_document(doc.id));
    assert!(matches!(missing, Error::NotFound(_)));
}

#[tokio::test]
async fn test_invalid_document_rejected() {
    let harness = Harness::new(ScriptedCapture::default(), ScriptedGenerator::default());

    let err = assert_err!(
        harness
            .orchestrator
            .add_document("scan.pdf", b"%PDF-1.4 binary")
            .await
    );
    assert!(matches!(
        err,
        Error::Extraction(ExtractError::InvalidFormat(_))
    ));
    assert_eq!(err.kind(), ErrorKind::Knowledge);
    assert!(harness.orchestrator.documents().is_empty());
}

#[tokio::test]
async fn test_oversized_document_rejected() {
    let extractor = PlainTextExtractor::new(32);
    let err = assert_err!(extractor.extract(menu().as_bytes(), "menu.txt").await);
    assert!(matches!(err, ExtractError::TooLarge { limit: 32, .. }));
}

#[tokio::test]
async fn test_pdf_pages_joined_by_blank_line() {
    let bytes = pdf_document(&["Menu del dia", "Postres caseros"]);
    let text = assert_ok!(PdfExtractor::default().extract(&bytes, "menu.pdf").await);

    let (first, second) = text.split_once("\n\n").unwrap();
    assert!(first.contains("Menu del dia"));
    assert!(second.contains("Postres caseros"));
}

#[tokio::test]
async fn test_any_extractor_dispatches_on_magic() {
    let extractor = AnyDocumentExtractor::default();

    let text = assert_ok!(
        extractor
            .extract(&pdf_document(&["Horario de apertura"]), "horario.pdf")
            .await
    );
    assert!(text.contains("Horario de apertura"));

    let text = assert_ok!(extractor.extract(b"solo texto", "notas.txt").await);
    assert_eq!(text, "solo texto");
}

#[tokio::test]
async fn test_default_capabilities_index_pdf_documents() {
    let caps = Capabilities::openai(
        &Config::default(),
        Arc::new(ScriptedCapture::default()),
        Arc::new(CountingAudio::default()),
    );
    let store = Arc::new(ChunkStore::new(
        Arc::new(HashEmbedder::default()),
        ChunkingConfig::new(200, 20).unwrap(),
    ));
    let orchestrator =
        ConversationOrchestrator::new(caps, Arc::clone(&store), test_settings()).unwrap();

    let pdf = pdf_document(&["Entrantes: croquetas", "Postres: flan casero"]);
    let doc = assert_ok!(orchestrator.add_document("carta.pdf", &pdf).await);
    assert_eq!(doc.size_bytes, pdf.len());
    assert!(doc.chunk_count >= 1);

    let result = assert_ok!(store.search("flan", 3).await);
    assert!(result.texts().iter().any(|t| t.contains("flan")));
}

#[tokio::test]
async fn test_search_finds_relevant_passage() {
    let store = ChunkStore::new(
        Arc::new(HashEmbedder::default()),
        ChunkingConfig::new(80, 10).unwrap(),
    );
    assert_ok!(store.ingest("menu.txt", menu().len(), &menu()).await);

    let result = assert_ok!(store.search("¿qué postres tienen? flan churros", 1).await);
    assert_eq!(result.len(), 1);
    assert!(result.texts()[0].contains("flan"));
}

#[tokio::test]
async fn test_top_k_larger_than_store_returns_all() {
    let store = ChunkStore::new(
        Arc::new(HashEmbedder::default()),
        ChunkingConfig::new(80, 10).unwrap(),
    );
    let doc = assert_ok!(store.ingest("menu.txt", menu().len(), &menu()).await);

    let result = assert_ok!(store.search("paella", 1000).await);
    assert_eq!(result.len(), doc.chunk_count);

    let scores: Vec<f32> = result.chunks.iter().map(|c| c.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_search_is_deterministic() {
    let store = ChunkStore::new(
        Arc::new(HashEmbedder::default()),
        ChunkingConfig::new(60, 15).unwrap(),
    );
    assert_ok!(store.ingest("menu.txt", menu().len(), &menu()).await);

    let first = assert_ok!(store.search("horario domingo", 3).await);
    let second = assert_ok!(store.search("horario domingo", 3).await);
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_readers_never_see_partial_documents() {
    let store = Arc::new(ChunkStore::new(
        Arc::new(HashEmbedder::default()),
        ChunkingConfig::new(40, 5).unwrap(),
    ));

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 0..20 {
                let doc = store
                    .ingest(&format!("menu-{i}.txt"), menu().len(), &menu())
                    .await
                    .unwrap();
                assert!(store.remove(doc.id));
            }
        })
    };

    let expected = ChunkStore::new(
        Arc::new(HashEmbedder::default()),
        ChunkingConfig::new(40, 5).unwrap(),
    )
    .ingest("reference", 0, &menu())
    .await
    .unwrap()
    .chunk_count;

    while !writer.is_finished() {
        let count = store.chunk_count();
        assert!(count == 0 || count == expected);
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();
    assert!(store.documents().is_empty());
    assert!(store.document(Uuid::new_v4()).is_none());
}
