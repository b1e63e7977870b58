use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use surety_core::{EventJournal, JournalEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalFile {
    head_hash: Option<String>,
    entries: Vec<JournalEntry>,
}

/// Persist the journal, replacing any previous file atomically.
pub fn save_journal(path: &Path, journal: &EventJournal) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = JournalFile {
        head_hash: journal.head_hash().map(str::to_string),
        entries: journal.entries().to_vec(),
    };
    let bytes = serde_json::to_vec_pretty(&file)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Load a journal file and verify its hash chain and recorded head.
pub fn load_journal(path: &Path) -> CliResult<EventJournal> {
    let bytes = fs::read(path)?;
    let file: JournalFile = serde_json::from_slice(&bytes)?;
    let journal =
        EventJournal::from_entries(file.entries).map_err(|e| CliError::Journal(e.to_string()))?;

    if journal.head_hash() != file.head_hash.as_deref() {
        return Err(CliError::Journal(
            "recorded head hash does not match the chain".to_string(),
        ));
    }
    Ok(journal)
}
