//! CLI search over one agent's knowledge base.
//!
//! Loads the configured indexes through [`Retriever::from_config`], runs a
//! single retrieval, and prints the citations either as a human-readable
//! list or as JSON.
//!
//! # Output
//!
//! ```text
//! 1. [0.74 Medium] Antenatal Care Guidelines / Pages 12-13
//!     file: anc_guidelines.pdf
//!     excerpt: "Pregnant women should receive iron and folic acid..."
//!     id: 6f1c...
//! ```

use anyhow::{bail, Result};

use crate::citation::Citation;
use crate::config::Config;
use crate::retrieve::Retriever;

/// Run a search from the CLI and print the results to stdout.
///
/// Unknown agents are rejected here so a typo on the command line is not
/// mistaken for an empty knowledge base.
pub fn run_search(
    config: &Config,
    agent: &str,
    query: &str,
    top_k: Option<usize>,
    min_similarity: Option<f32>,
    json: bool,
) -> Result<()> {
    if top_k == Some(0) {
        bail!("--top-k must be >= 1");
    }
    if let Some(min) = min_similarity {
        if !(-1.0..=1.0).contains(&min) {
            bail!("--min-similarity must be in [-1.0, 1.0]");
        }
    }

    let retriever = Retriever::from_config(config)?;
    let Some(canonical) = retriever.agents().resolve(agent) else {
        bail!(
            "Unknown agent: '{}'. Available: {}",
            agent,
            retriever.agents().names().join(", ")
        );
    };
    if retriever.registry().get(canonical).is_none() {
        eprintln!(
            "No knowledge base loaded for '{}'. Run `kb build {}` first.",
            canonical, canonical
        );
    }

    let citations = retriever.retrieve(canonical, query, top_k, min_similarity);

    if json {
        println!("{}", serde_json::to_string_pretty(&citations)?);
        return Ok(());
    }

    print_citations(&citations);
    Ok(())
}

fn print_citations(citations: &[Citation]) {
    if citations.is_empty() {
        println!("No results.");
        return;
    }

    for (i, c) in citations.iter().enumerate() {
        println!(
            "{}. [{:.2} {}] {} / {}",
            i + 1,
            c.relevance_score,
            c.confidence,
            c.document,
            c.page_reference
        );
        println!("    file: {}", c.filename);
        println!("    excerpt: \"{}\"", c.excerpt.replace('\n', " ").trim());
        println!("    id: {}", c.passage_id);
        println!();
    }
}
