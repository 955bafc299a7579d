use std::path::{Path, PathBuf};

/// Failed-login burst policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    pub threshold: usize,
    pub window_minutes: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            window_minutes: 5,
        }
    }
}

impl DetectorConfig {
    pub fn new(threshold: usize, window_minutes: i64) -> Self {
        Self {
            threshold,
            window_minutes,
        }
    }
}

/// Where every pipeline stage reads and writes, relative to one root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("data").join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("data").join("processed")
    }

    pub fn synthetic_events(&self) -> PathBuf {
        self.raw_dir().join("synthetic_logs.jsonl")
    }

    pub fn real_events(&self) -> PathBuf {
        self.raw_dir().join("real_events.json")
    }

    pub fn normalized_events(&self) -> PathBuf {
        self.processed_dir().join("normalized_events.csv")
    }

    pub fn findings(&self) -> PathBuf {
        self.processed_dir().join("findings.json")
    }

    pub fn enriched_findings(&self) -> PathBuf {
        self.processed_dir().join("findings_enriched.json")
    }

    pub fn summary_report(&self) -> PathBuf {
        self.processed_dir().join("ai_summary.md")
    }

    pub fn poam(&self) -> PathBuf {
        self.processed_dir().join("poam.csv")
    }

    pub fn tickets_dir(&self) -> PathBuf {
        self.root.join("tickets")
    }

    pub fn dashboard(&self) -> PathBuf {
        self.root.join("DASHBOARD.md")
    }
}
