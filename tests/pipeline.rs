//! End-to-end pipeline tests at the library level: build an agent's index
//! from PDFs on disk, retrieve citations, and check status and cleanup.

mod common;

use std::path::Path;

use grounding_kb::config::Config;
use grounding_kb::embedding::create_provider;
use grounding_kb::ingest::{add_pdfs, build_agent, build_all, cleanup_agent, init_dirs, BuildOutcome};
use grounding_kb::progress::NoProgress;
use grounding_kb::retrieve::Retriever;
use grounding_kb::stats::agent_status;
use grounding_kb::store::{IndexStore, VECTORS_FILE};
use tempfile::TempDir;

use common::{anc_guide, pdf_with_pages, write, RIGHTS_PAGE};

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.raw_pdfs = root.join("raw_pdfs");
    config.paths.processed = root.join("processed");
    config.embedding.provider = "hash".to_string();
    config.embedding.dims = Some(1024);
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 40;
    config.chunking.min_chunk_chars = 30;
    config.retrieval.min_similarity = 0.05;
    config
}

fn build(config: &Config, agent: &str, force: bool) -> BuildOutcome {
    let provider = create_provider(&config.embedding).unwrap();
    build_agent(config, provider.as_ref(), agent, force, &NoProgress).unwrap()
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    init_dirs(&config).unwrap();
    write(&config.paths.agent_pdf_dir("maaya").join("anc_guide.pdf"), &anc_guide());
    (tmp, config)
}

#[test]
fn test_build_and_retrieve_with_page_citations() {
    let (_tmp, config) = setup();

    let outcome = build(&config, "maaya", false);
    let BuildOutcome::Built(summary) = &outcome else {
        panic!("expected a build, got {:?}", outcome);
    };
    assert_eq!(summary.agent, "maaya");
    assert_eq!(summary.documents, 1);
    assert!(summary.passages >= 2);
    assert_eq!(summary.model_name, "feature-hash-v1");
    assert_eq!(summary.dims, 1024);

    let retriever = Retriever::from_config(&config).unwrap();
    assert_eq!(retriever.available_agents(), vec!["maaya".to_string()]);

    let citations = retriever.retrieve("maternal", "iron folic acid supplements", None, None);
    assert!(!citations.is_empty());
    let top = &citations[0];
    assert_eq!(top.document, "Antenatal Care Guide");
    assert_eq!(top.filename, "anc_guide.pdf");
    assert!(top.pages.contains(&1), "pages: {:?}", top.pages);
    assert!(top.page_reference.starts_with("Page"));
    assert!(top.full_text.to_lowercase().contains("folic"));
    assert!(citations.len() <= config.retrieval.top_k);
    for pair in citations.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }

    let later = retriever.retrieve("maaya", "exclusive breastfeeding after birth", None, None);
    assert!(!later.is_empty());
    assert!(later[0].pages.contains(&2), "pages: {:?}", later[0].pages);
}

#[test]
fn test_existing_index_skipped_unless_forced() {
    let (_tmp, config) = setup();

    assert!(matches!(build(&config, "maaya", false), BuildOutcome::Built(_)));
    let first = IndexStore::new(&config.paths.processed)
        .load("maaya")
        .unwrap();

    let skipped = build(&config, "maaya", false);
    assert!(matches!(skipped, BuildOutcome::Skipped { .. }));
    assert!(skipped.is_success());

    assert!(matches!(build(&config, "maternal", true), BuildOutcome::Built(_)));
    let second = IndexStore::new(&config.paths.processed)
        .load("maaya")
        .unwrap();

    let ids = |index: &grounding_kb::index::PassageIndex| {
        index
            .passages()
            .iter()
            .map(|p| p.id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.vectors(), second.vectors());
}

#[test]
fn test_build_all_reports_each_agent() {
    let (_tmp, config) = setup();
    write(
        &config.paths.agent_pdf_dir("nyaya").join("dv_act.pdf"),
        &pdf_with_pages(Some("Protection of Women Act"), &[RIGHTS_PAGE]),
    );

    let provider = create_provider(&config.embedding).unwrap();
    let outcomes = build_all(&config, provider.as_ref(), false, &NoProgress);

    assert_eq!(outcomes.len(), 5);
    for (agent, outcome) in &outcomes {
        match agent.as_str() {
            "maaya" | "nyaya" => assert!(matches!(outcome, BuildOutcome::Built(_))),
            _ => assert!(matches!(outcome, BuildOutcome::Failed { .. })),
        }
    }

    let retriever = Retriever::from_config(&config).unwrap();
    let results = retriever.retrieve_multi(
        "domestic violence protection order",
        &["legal".to_string(), "meher".to_string()],
        Some(2),
    );
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["nyaya"]);
    assert_eq!(results["nyaya"][0].document, "Protection of Women Act");
}

#[test]
fn test_unreadable_pdf_is_skipped() {
    let (_tmp, config) = setup();
    write(
        &config.paths.agent_pdf_dir("maaya").join("broken.pdf"),
        b"not a pdf",
    );

    let BuildOutcome::Built(summary) = build(&config, "maaya", false) else {
        panic!("expected a build");
    };
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.skipped_files.len(), 1);
    assert!(summary.skipped_files[0].ends_with("broken.pdf"));
}

#[test]
fn test_graceful_absence() {
    let (_tmp, config) = setup();
    let retriever = Retriever::from_config(&config).unwrap();

    assert!(retriever.available_agents().is_empty());
    assert!(retriever.retrieve("maaya", "iron", None, None).is_empty());
    assert!(retriever.retrieve("unknown", "iron", None, None).is_empty());
}

#[test]
fn test_corrupt_index_is_unavailable() {
    let (_tmp, config) = setup();
    assert!(matches!(build(&config, "maaya", false), BuildOutcome::Built(_)));

    let vectors = IndexStore::new(&config.paths.processed)
        .agent_dir("maaya")
        .join(VECTORS_FILE);
    std::fs::write(&vectors, [1u8, 2, 3]).unwrap();

    let retriever = Retriever::from_config(&config).unwrap();
    assert!(retriever.available_agents().is_empty());
    assert!(retriever
        .retrieve("maaya", "iron folic acid", None, None)
        .is_empty());
}

#[test]
fn test_model_change_makes_index_unavailable() {
    let (_tmp, mut config) = setup();
    assert!(matches!(build(&config, "maaya", false), BuildOutcome::Built(_)));

    config.embedding.dims = Some(256);
    let retriever = Retriever::from_config(&config).unwrap();
    assert!(retriever.available_agents().is_empty());
}

#[test]
fn test_status_and_cleanup() {
    let (_tmp, config) = setup();

    let before = agent_status(&config, "maaya").unwrap();
    assert_eq!(before.pdf_count, 1);
    assert!(!before.is_processed);

    assert!(matches!(build(&config, "maaya", false), BuildOutcome::Built(_)));
    let after = agent_status(&config, "maaya").unwrap();
    assert!(after.is_processed);
    assert!(after.chunk_count >= 2);
    assert!(after.built_at.is_some());
    assert_eq!(after.model_name.as_deref(), Some("feature-hash-v1"));

    assert!(cleanup_agent(&config, "maaya").unwrap());
    assert!(!cleanup_agent(&config, "maaya").unwrap());
    let cleaned = agent_status(&config, "maaya").unwrap();
    assert!(!cleaned.is_processed);
    assert_eq!(cleaned.pdf_count, 1);
}

#[test]
fn test_add_pdfs_copies_only_pdfs() {
    let (tmp, config) = setup();
    let incoming = tmp.path().join("incoming");
    write(&incoming.join("pcos.pdf"), &anc_guide());
    write(&incoming.join("notes.txt"), b"not a pdf");

    let copied = add_pdfs(
        &config,
        "reproductive",
        &[
            incoming.join("pcos.pdf"),
            incoming.join("notes.txt"),
            incoming.join("missing.pdf"),
        ],
    )
    .unwrap();

    assert_eq!(copied.len(), 1);
    assert!(config.paths.agent_pdf_dir("gynika").join("pcos.pdf").is_file());
    assert!(add_pdfs(&config, "astrology", &[incoming.join("pcos.pdf")]).is_err());
}
