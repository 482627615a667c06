//! Knowledge base status overview.
//!
//! Reports, per agent, how many source PDFs are waiting in its directory,
//! whether an index has been built, and how many passages it holds. Used by
//! `kb status` to give confidence that builds are up to date.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::agents::AgentSet;
use crate::config::Config;
use crate::ingest::discover_pdfs;
use crate::store::IndexStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub agent: String,
    pub pdf_count: usize,
    pub pdf_bytes: u64,
    pub is_processed: bool,
    pub chunk_count: usize,
    pub pdf_path: PathBuf,
    pub index_path: PathBuf,
    pub built_at: Option<DateTime<Utc>>,
    pub model_name: Option<String>,
}

/// Status of one agent. Unknown names yield an error; a missing or
/// unreadable index simply reports `is_processed: false`.
pub fn agent_status(config: &Config, agent: &str) -> Result<AgentStatus> {
    let agents = AgentSet::from_config(&config.agents);
    let Some(agent) = agents.resolve(agent) else {
        anyhow::bail!("Unknown agent: '{}'", agent);
    };

    let pdf_path = config.paths.agent_pdf_dir(agent);
    let pdfs = discover_pdfs(&pdf_path, &config.paths).unwrap_or_default();
    let pdf_bytes = pdfs
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();

    let store = IndexStore::new(&config.paths.processed);
    let meta = if store.exists(agent) {
        store.read_meta(agent).ok()
    } else {
        None
    };

    Ok(AgentStatus {
        agent: agent.to_string(),
        pdf_count: pdfs.len(),
        pdf_bytes,
        is_processed: meta.is_some(),
        chunk_count: meta.as_ref().map(|m| m.passage_count).unwrap_or(0),
        pdf_path,
        index_path: store.agent_dir(agent),
        built_at: meta.as_ref().map(|m| m.built_at),
        model_name: meta.map(|m| m.model_name),
    })
}

pub fn all_status(config: &Config) -> Result<Vec<AgentStatus>> {
    config
        .agents
        .names
        .iter()
        .map(|agent| agent_status(config, agent))
        .collect()
}

/// Print the status table to stdout.
pub fn print_status(statuses: &[AgentStatus]) {
    println!("Knowledge Base Status");
    println!("=====================");
    println!();
    println!(
        "  {:<12} {:>6} {:>10} {:>8} {:>9}   {}",
        "AGENT", "PDFS", "SIZE", "CHUNKS", "INDEXED", "BUILT"
    );
    println!("  {}", "-".repeat(68));
    for s in statuses {
        let built = match s.built_at {
            Some(ts) => format_ts_relative(ts.timestamp()),
            None => "never".to_string(),
        };
        println!(
            "  {:<12} {:>6} {:>10} {:>8} {:>9}   {}",
            s.agent,
            s.pdf_count,
            format_bytes(s.pdf_bytes),
            s.chunk_count,
            if s.is_processed { "yes" } else { "no" },
            built
        );
    }
    println!();
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_of_empty_agent() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.raw_pdfs = tmp.path().join("raw");
        config.paths.processed = tmp.path().join("processed");
        std::fs::create_dir_all(tmp.path().join("raw/gynika")).unwrap();
        std::fs::write(tmp.path().join("raw/gynika/pcos.pdf"), b"%PDF-1.4").unwrap();

        let status = agent_status(&config, "reproductive").unwrap();
        assert_eq!(status.agent, "gynika");
        assert_eq!(status.pdf_count, 1);
        assert_eq!(status.pdf_bytes, 8);
        assert!(!status.is_processed);
        assert_eq!(status.chunk_count, 0);
        assert_eq!(all_status(&config).unwrap().len(), 5);
        assert!(agent_status(&config, "nobody").is_err());
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_ts_relative(Utc::now().timestamp()), "just now");
    }
}
