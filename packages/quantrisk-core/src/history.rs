//! Analysis history tracking and persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::analysis::{AnalysisReport, PortfolioReport};
use crate::config::{default_history_path, HISTORY_FILE_VAR};
use crate::{Error, Result};

/// Which kind of report an entry holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Analysis,
    Portfolio,
}

/// A stored report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Monotonic identifier within one history file
    pub id: u64,
    pub kind: HistoryKind,
    /// Symbols covered by the report
    pub symbols: Vec<String>,
    /// The report as JSON, opaque to the history
    pub report: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// On-disk layout of the history file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HistoryFile {
    next_id: u64,
    entries: Vec<HistoryEntry>,
}

/// Append-only history of analysis reports, persisted as JSON.
#[derive(Debug)]
pub struct AnalysisHistory {
    /// Path to the history JSON file
    path: PathBuf,
    /// In-memory history state
    state: HistoryFile,
}

impl AnalysisHistory {
    /// Create a history with the default path.
    ///
    /// Default path: `~/.quantrisk/history.json`
    /// Can be overridden with `QUANTRISK_HISTORY_FILE` environment variable.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_path())
    }

    /// Create a history with a custom path.
    ///
    /// A missing file starts an empty history. A file that cannot be read or
    /// parsed is an error, so a later `save` never overwrites it.
    pub fn with_path(path: PathBuf) -> Result<Self> {
        let state = Self::load_from_path(&path)?;
        Ok(Self { path, state })
    }

    /// Create an in-memory history (no persistence).
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: HistoryFile::default(),
        }
    }

    /// Get the default history file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var(HISTORY_FILE_VAR) {
            return PathBuf::from(path);
        }
        default_history_path()
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn load_from_path(path: &Path) -> Result<HistoryFile> {
        if !path.exists() {
            return Ok(HistoryFile::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the current history to disk.
    pub fn save(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.state)?;
        fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), entries = self.state.entries.len(), "saved history");
        Ok(())
    }

    /// Reload the history from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.state = Self::load_from_path(&self.path)?;
        Ok(())
    }

    /// Append a single-security report.
    pub fn record_analysis(&mut self, report: &AnalysisReport) -> Result<&HistoryEntry> {
        let value = serde_json::to_value(report)?;
        Ok(self.append(HistoryKind::Analysis, vec![report.symbol.clone()], value))
    }

    /// Append a portfolio report.
    pub fn record_portfolio(&mut self, report: &PortfolioReport) -> Result<&HistoryEntry> {
        let symbols = report
            .portfolio
            .positions
            .iter()
            .map(|p| p.symbol.clone())
            .collect();
        let value = serde_json::to_value(report)?;
        Ok(self.append(HistoryKind::Portfolio, symbols, value))
    }

    /// Append an already serialized report.
    pub fn append(
        &mut self,
        kind: HistoryKind,
        symbols: Vec<String>,
        report: serde_json::Value,
    ) -> &HistoryEntry {
        self.state.next_id += 1;
        self.state.entries.push(HistoryEntry {
            id: self.state.next_id,
            kind,
            symbols,
            report,
            created_at: Utc::now(),
        });
        &self.state.entries[self.state.entries.len() - 1]
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.state.entries
    }

    /// Find an entry by id.
    pub fn find(&self, id: u64) -> Option<&HistoryEntry> {
        self.state.entries.iter().find(|e| e.id == id)
    }

    /// Remove an entry by id.
    pub fn remove(&mut self, id: u64) -> Result<HistoryEntry> {
        if let Some(idx) = self.state.entries.iter().position(|e| e.id == id) {
            Ok(self.state.entries.remove(idx))
        } else {
            Err(Error::EntryNotFound(id))
        }
    }

    /// Drop every entry. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }
}
