//! Per-bucket daily journal.
//!
//! Every handled note is appended to a per-day markdown log under
//! `journal/<bucket>/YYYY-MM-DD.md`, with the note body and a checklist of
//! the side effects that completed. The journal is append-only and purely
//! best-effort: a write failure is reported as a failed effect, never as a
//! failed request.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::{Bucket, Note};

pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    pub fn new(dir: &Path) -> Journal {
        Journal {
            dir: dir.to_path_buf(),
        }
    }

    /// Append a journal entry for a handled note. `extra` rows render as
    /// bold key/value lines (e.g. detected business name and address).
    /// Returns the path written to.
    pub fn append(
        &self,
        bucket: Bucket,
        note: &Note,
        extra: &[(String, String)],
        actions: &[String],
    ) -> Result<PathBuf> {
        let day_dir = self.dir.join(bucket.as_str().to_lowercase());
        std::fs::create_dir_all(&day_dir)
            .with_context(|| format!("Failed to create journal dir: {}", day_dir.display()))?;

        let date = note.timestamp.format("%Y-%m-%d");
        let path = day_dir.join(format!("{}.md", date));

        let mut entry = format!(
            "\n## [{}] {} Voice Memo - {}\n\n",
            note.timestamp.format("%H:%M"),
            bucket,
            note.recording_id
        );

        for (key, value) in extra {
            entry.push_str(&format!("**{}:** {}\n", key, value));
        }
        if !extra.is_empty() {
            entry.push('\n');
        }

        entry.push_str(&format!(
            "**Summary:**\n{}\n\n**Transcription:**\n{}\n\n**Actions Taken:**\n",
            or_na(&note.summary),
            or_na(&note.transcription)
        ));
        for action in actions {
            entry.push_str(&format!("- [x] {}\n", action));
        }
        entry.push_str("\n---\n");

        append_to_file(&path, &entry)?;
        println!("Logged to journal: {}", path.display());
        Ok(path)
    }
}

fn or_na(s: &str) -> &str {
    if s.trim().is_empty() {
        "N/A"
    } else {
        s
    }
}

fn append_to_file(path: &Path, entry: &str) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open journal file: {}", path.display()))?;
    file.write_all(entry.as_bytes())
        .with_context(|| format!("Failed to append journal entry: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::short_hash;
    use chrono::{TimeZone, Utc};

    fn sample_note() -> Note {
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 4, 9, 15, 0).unwrap();
        Note {
            recording_id: "rec_j".to_string(),
            timestamp,
            summary: "Call dentist".to_string(),
            transcription: String::new(),
            hash: short_hash("rec_j", &timestamp.to_rfc3339()),
            source: "test".to_string(),
        }
    }

    #[test]
    fn appends_entry_to_day_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let journal = Journal::new(tmp.path());

        let note = sample_note();
        let path = journal
            .append(
                Bucket::Personal,
                &note,
                &[],
                &["Created reminder".to_string()],
            )
            .unwrap();

        assert!(path.ends_with("personal/2026-03-04.md"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("## [09:15] PERSONAL Voice Memo - rec_j"));
        assert!(content.contains("- [x] Created reminder"));
        assert!(content.contains("**Transcription:**\nN/A"));
    }

    #[test]
    fn second_append_extends_same_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let journal = Journal::new(tmp.path());
        let note = sample_note();

        journal.append(Bucket::Comcast, &note, &[], &[]).unwrap();
        let path = journal
            .append(
                Bucket::Comcast,
                &note,
                &[("Business".to_string(), "Rainier Pizza".to_string())],
                &[],
            )
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("## [09:15]").count(), 2);
        assert!(content.contains("**Business:** Rainier Pizza"));
    }
}
