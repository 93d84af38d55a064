use async_trait::async_trait;
use docket::{
    completion::{CompletionClient, CompletionClientError, CompletionRequest},
    embedding::HashEmbeddingClient,
    extraction::{ExtractionError, TextExtractor},
    metrics::PipelineMetrics,
    processing::{
        CallPolicy, Collaborators, DocumentApi, DocumentService, IngestSettings, RetryPolicy,
        TextSplitter, UploadedFile,
        summarize::format_summary_record,
        types::{MISSING_COLLECTION_NAME, MISSING_FILES, UPLOAD_SUCCESS_MESSAGE},
    },
    registry::{CollectionRegistry, EMPTY_LISTING, SqliteRegistry},
    vector_store::{MemoryVectorStore, VectorStore},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const DIMENSION: usize = 16;

/// Treats uploaded bytes as UTF-8 text.
struct Utf8Extractor;

#[async_trait]
impl TextExtractor for Utf8Extractor {
    async fn extract_text(
        &self,
        _file_name: &str,
        bytes: &[u8],
    ) -> Result<String, ExtractionError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|error| ExtractionError::Unreadable(error.to_string()))
    }
}

/// Summaries report the word count of their input; answers echo a fixed citation.
#[derive(Default)]
struct ScriptedLlm {
    fail_summaries: bool,
    summary_calls: AtomicUsize,
    answer_calls: AtomicUsize,
}

fn scripted_summary(chunk: &str) -> String {
    format!("Digest of {} words.", chunk.split_whitespace().count())
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError> {
        if request.system.is_some() {
            self.answer_calls.fetch_add(1, Ordering::SeqCst);
            return Ok("Per contract.pdf, the tenant pays.".into());
        }
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_summaries {
            return Err(CompletionClientError::GenerationFailed("rate limited".into()));
        }
        let chunk = request
            .prompt
            .split_once("Here is the document to summarize:\n\n")
            .map(|(_, chunk)| chunk)
            .unwrap_or_default();
        Ok(scripted_summary(chunk))
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<MemoryVectorStore>,
    registry: Arc<SqliteRegistry>,
    llm: Arc<ScriptedLlm>,
    metrics: Arc<PipelineMetrics>,
    service: Arc<DocumentService>,
}

fn policy() -> CallPolicy {
    CallPolicy {
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        },
    }
}

fn service_over(
    store: Arc<MemoryVectorStore>,
    registry: Arc<SqliteRegistry>,
    llm: Arc<ScriptedLlm>,
    splitter: TextSplitter,
    metrics: Arc<PipelineMetrics>,
) -> DocumentService {
    DocumentService::new(
        Collaborators {
            extractor: Arc::new(Utf8Extractor),
            embedder: Arc::new(HashEmbeddingClient::new(DIMENSION)),
            store,
            completion: llm,
            registry,
        },
        IngestSettings {
            splitter,
            dimension: DIMENSION,
            summary_concurrency: 2,
            policy: policy(),
        },
        metrics,
    )
}

async fn harness_with(splitter: TextSplitter, llm: ScriptedLlm) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let registry = Arc::new(
        SqliteRegistry::open(dir.path().join("collections.db"))
            .await
            .expect("registry"),
    );
    let store = Arc::new(MemoryVectorStore::new());
    let llm = Arc::new(llm);
    let metrics = Arc::new(PipelineMetrics::new());
    let service = Arc::new(service_over(
        store.clone(),
        registry.clone(),
        llm.clone(),
        splitter,
        metrics.clone(),
    ));
    Harness {
        _dir: dir,
        store,
        registry,
        llm,
        metrics,
        service,
    }
}

async fn harness() -> Harness {
    harness_with(
        TextSplitter::new(6000, 100).expect("splitter"),
        ScriptedLlm::default(),
    )
    .await
}

#[tokio::test]
async fn contract_example_end_to_end() {
    let h = harness().await;
    let status = h
        .service
        .upload_files(
            vec![UploadedFile::new("contract.pdf", "A".repeat(50_000))],
            "c1",
        )
        .await;
    assert_eq!(status, UPLOAD_SUCCESS_MESSAGE);

    let entries = h.registry.read_all().await.expect("registry");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].collection_name, "c1");
    assert_eq!(entries[0].files, "contract.pdf");
    assert!(
        h.service
            .unindexed_collections()
            .await
            .expect("check")
            .is_empty()
    );

    let passages = h.service.search("A", "c1").await;
    assert!(!passages.is_empty());
    assert!(passages.starts_with("Summary of contract.pdf (Part 1):"));

    assert!(h.service.list_collections().await.contains("Collection: c1"));

    let snapshot = h.service.metrics_snapshot();
    assert_eq!(snapshot.documents_ingested, 1);
    assert_eq!(snapshot.summaries_generated, 1);
    assert_eq!(snapshot.records_stored, 1);
    assert_eq!(snapshot.searches_served, 1);
}

#[tokio::test]
async fn two_files_are_registered_together() {
    let h = harness().await;
    let status = h
        .service
        .upload_files(
            vec![
                UploadedFile::new("lease.pdf", "The tenant pays rent monthly."),
                UploadedFile::new("addendum.pdf", "Pets are allowed with a deposit."),
            ],
            "leases",
        )
        .await;
    assert_eq!(status, UPLOAD_SUCCESS_MESSAGE);

    let entries = h.registry.read_all().await.expect("registry");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_names(), vec!["lease.pdf", "addendum.pdf"]);
    assert_eq!(
        h.service.list_collections().await,
        "Collection: leases\nFiles: lease.pdf, addendum.pdf\n\n"
    );
    assert_eq!(h.llm.summary_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn search_returns_at_most_two_stored_chunks() {
    let splitter = TextSplitter::new(8, 2).expect("splitter");
    let h = harness_with(splitter, ScriptedLlm::default()).await;
    let files = vec![
        UploadedFile::new("a.pdf", "one two three four five six seven eight nine ten eleven"),
        UploadedFile::new("b.pdf", "alpha beta gamma delta epsilon zeta eta theta iota"),
    ];

    let mut accumulated = String::new();
    for file in &files {
        let text = String::from_utf8(file.bytes.clone()).expect("utf8");
        for (idx, chunk) in splitter.split(&text).iter().enumerate() {
            accumulated.push_str(&format_summary_record(
                &file.name,
                idx + 1,
                &scripted_summary(&chunk.text),
            ));
        }
    }
    let stored: Vec<String> = splitter
        .split(&accumulated)
        .into_iter()
        .map(|chunk| chunk.text)
        .collect();
    assert!(stored.len() > 2);

    assert_eq!(
        h.service.upload_files(files, "c1").await,
        UPLOAD_SUCCESS_MESSAGE
    );
    assert_eq!(h.store.record_count("c1").await, Some(stored.len()));

    let result = h.service.search("Digest of words", "c1").await;
    let matches_pair = (0..stored.len()).any(|first| {
        (0..stored.len()).any(|second| {
            first != second && result == format!("{}\n\n{}", stored[first], stored[second])
        })
    });
    assert!(matches_pair, "unexpected search output: {result:?}");
}

#[tokio::test]
async fn existing_collection_fails_without_registry_append() {
    let h = harness().await;
    h.store
        .create_collection("taken", DIMENSION)
        .await
        .expect("pre-create");

    let status = h
        .service
        .upload_files(vec![UploadedFile::new("a.pdf", "text")], "taken")
        .await;

    assert!(status.starts_with("Error creating collection:"), "{status}");
    assert!(status.ends_with("Please try a different collection name."));
    assert!(h.registry.read_all().await.expect("registry").is_empty());
    assert!(h.store.collection_exists("taken").await.expect("exists"));
    assert_eq!(h.llm.summary_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.metrics.snapshot().failed_ingestions, 1);
}

#[tokio::test]
async fn registered_name_is_rejected_before_any_summary() {
    let h = harness().await;
    h.registry
        .append("stale", &["old.pdf".to_string()])
        .await
        .expect("append");
    assert_eq!(
        h.service.unindexed_collections().await.expect("check"),
        vec!["stale".to_string()]
    );

    let status = h
        .service
        .upload_files(vec![UploadedFile::new("a.pdf", "text")], "stale")
        .await;

    assert!(status.starts_with("Error creating collection:"), "{status}");
    assert_eq!(h.llm.summary_calls.load(Ordering::SeqCst), 0);
    assert!(!h.store.collection_exists("stale").await.expect("exists"));
    assert_eq!(h.registry.read_all().await.expect("registry").len(), 1);
}

#[tokio::test]
async fn empty_upload_changes_nothing() {
    let h = harness().await;

    assert_eq!(h.service.upload_files(vec![], "").await, MISSING_COLLECTION_NAME);
    assert_eq!(h.service.upload_files(vec![], "c1").await, MISSING_FILES);

    assert!(h.registry.read_all().await.expect("registry").is_empty());
    assert!(h.store.list_collections().await.expect("list").is_empty());
    assert_eq!(h.service.list_collections().await, EMPTY_LISTING);
}

#[tokio::test]
async fn invalid_and_unknown_collections_return_messages() {
    let h = harness().await;

    assert_eq!(h.service.search("rent", "").await, MISSING_COLLECTION_NAME);
    assert_eq!(
        h.service.ask_question("rent", "   ").await,
        MISSING_COLLECTION_NAME
    );

    let search = h.service.search("rent", "never-created").await;
    assert!(search.starts_with("Error accessing collection:"), "{search}");
    assert!(search.ends_with("Make sure the collection name is correct."));

    let answer = h.service.ask_question("rent", "never-created").await;
    assert_eq!(answer, search);
    assert_eq!(h.llm.answer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ask_question_returns_completion_verbatim() {
    let h = harness().await;
    h.service
        .upload_files(
            vec![UploadedFile::new("contract.pdf", "The tenant pays rent.")],
            "c1",
        )
        .await;

    let answer = h.service.ask_question("Who pays rent?", "c1").await;
    assert_eq!(answer, "Per contract.pdf, the tenant pays.");
    assert_eq!(h.llm.answer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.service.metrics_snapshot().answers_served, 1);
}

#[tokio::test]
async fn failed_summary_rolls_back_collection() {
    let h = harness_with(
        TextSplitter::new(6000, 100).expect("splitter"),
        ScriptedLlm {
            fail_summaries: true,
            ..ScriptedLlm::default()
        },
    )
    .await;

    let status = h
        .service
        .upload_files(vec![UploadedFile::new("a.pdf", "some text")], "c1")
        .await;

    assert!(status.starts_with("LLM service request failed"), "{status}");
    assert!(!h.store.collection_exists("c1").await.expect("exists"));
    assert!(h.registry.read_all().await.expect("registry").is_empty());
    assert_eq!(h.metrics.snapshot().failed_ingestions, 1);

    let retry = service_over(
        h.store.clone(),
        h.registry.clone(),
        Arc::new(ScriptedLlm::default()),
        TextSplitter::new(6000, 100).expect("splitter"),
        Arc::new(PipelineMetrics::new()),
    );
    assert_eq!(
        retry
            .upload_files(vec![UploadedFile::new("a.pdf", "some text")], "c1")
            .await,
        UPLOAD_SUCCESS_MESSAGE
    );
}

#[tokio::test]
async fn unreadable_document_reports_file_name() {
    let h = harness().await;
    let status = h
        .service
        .upload_files(vec![UploadedFile::new("broken.pdf", vec![0xff, 0xfe, 0xfd])], "c1")
        .await;

    assert!(status.starts_with("Error reading file broken.pdf"), "{status}");
    assert!(!h.store.collection_exists("c1").await.expect("exists"));
}

#[tokio::test]
async fn parallel_ingestions_into_distinct_names_all_register() {
    let h = harness().await;
    let mut handles = Vec::new();
    for idx in 0..4 {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .upload_files(
                    vec![UploadedFile::new(format!("doc{idx}.pdf"), "Clause text.")],
                    &format!("c{idx}"),
                )
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("join"), UPLOAD_SUCCESS_MESSAGE);
    }

    let entries = h.registry.read_all().await.expect("registry");
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn concurrent_uploads_to_same_name_have_one_winner() {
    let h = harness().await;
    let mut handles = Vec::new();
    for idx in 0..4 {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .upload_files(
                    vec![UploadedFile::new(format!("doc{idx}.pdf"), "Clause text.")],
                    "shared",
                )
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.expect("join") == UPLOAD_SUCCESS_MESSAGE {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(h.registry.read_all().await.expect("registry").len(), 1);
}
