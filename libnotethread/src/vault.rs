//! Vault access: listing markdown notes and reading the recently modified ones

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, VaultError};
use crate::types::Note;

/// A markdown file in the vault, before its content is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFile {
    pub path: PathBuf,
    pub name: String,
    pub modified_at: DateTime<Utc>,
}

/// Source of notes
#[async_trait]
pub trait VaultReader: Send + Sync {
    /// Every markdown note in the vault
    async fn list_markdown_notes(&self) -> Result<Vec<NoteFile>>;

    /// Note text, or `None` if the note vanished or is unreadable
    async fn read_note_content(&self, note: &NoteFile) -> Result<Option<String>>;
}

/// Vault backed by a directory of `.md` files
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

/// Blocking walk over `root`, skipping hidden files and directories
///
/// Ignore files are not consulted: a note listed in `.gitignore` is still a
/// note.
fn walk_markdown(root: &Path) -> Result<Vec<NoteFile>> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .build();

    let mut notes = Vec::new();
    for entry in walker {
        let entry = entry.map_err(VaultError::Walk)?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|ft| ft.is_file()) || !is_markdown(path) {
            continue;
        }

        let metadata = entry.metadata().map_err(VaultError::Walk)?;
        let modified = metadata.modified().map_err(VaultError::Io)?;
        notes.push(NoteFile {
            path: path.to_path_buf(),
            name: entry.file_name().to_string_lossy().into_owned(),
            modified_at: DateTime::<Utc>::from(modified),
        });
    }

    notes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(notes)
}

#[async_trait]
impl VaultReader for FsVault {
    async fn list_markdown_notes(&self) -> Result<Vec<NoteFile>> {
        if !tokio::fs::try_exists(&self.root)
            .await
            .map_err(VaultError::Io)?
        {
            return Err(VaultError::NotFound(self.root.display().to_string()).into());
        }

        let root = self.root.clone();
        let notes = tokio::task::spawn_blocking(move || walk_markdown(&root))
            .await
            .map_err(|e| VaultError::Io(std::io::Error::other(e)))??;

        tracing::debug!(
            "Found {} markdown notes under {}",
            notes.len(),
            self.root.display()
        );
        Ok(notes)
    }

    async fn read_note_content(&self, note: &NoteFile) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&note.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!("Skipping non UTF-8 note {}", note.path.display());
                Ok(None)
            }
            Err(e) => Err(VaultError::Io(e).into()),
        }
    }
}

/// In-memory vault for tests
#[derive(Default)]
pub struct MemoryVault {
    notes: Vec<(NoteFile, Option<String>)>,
    reads: AtomicUsize,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a note; `content: None` simulates an unreadable file
    pub fn with_note(
        mut self,
        name: &str,
        modified_at: DateTime<Utc>,
        content: Option<&str>,
    ) -> Self {
        self.notes.push((
            NoteFile {
                path: PathBuf::from(name),
                name: name.to_string(),
                modified_at,
            },
            content.map(str::to_string),
        ));
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VaultReader for MemoryVault {
    async fn list_markdown_notes(&self) -> Result<Vec<NoteFile>> {
        Ok(self.notes.iter().map(|(file, _)| file.clone()).collect())
    }

    async fn read_note_content(&self, note: &NoteFile) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .notes
            .iter()
            .find(|(file, _)| file.path == note.path)
            .and_then(|(_, content)| content.clone()))
    }
}

/// Keep the files modified strictly after `now - window_days`
///
/// Input order is preserved.
pub fn filter_modified(files: Vec<NoteFile>, window_days: u32, now: DateTime<Utc>) -> Vec<NoteFile> {
    let cutoff = now - Duration::days(i64::from(window_days));
    files
        .into_iter()
        .filter(|file| file.modified_at > cutoff)
        .collect()
}

/// Read every note modified within the window
///
/// Notes that cannot be read are skipped. An empty result is not an error;
/// callers decide what to tell the user.
pub async fn collect_modified_notes(
    vault: &dyn VaultReader,
    window_days: u32,
    now: DateTime<Utc>,
) -> Result<Vec<Note>> {
    if window_days == 0 {
        return Err(crate::NotethreadError::InvalidInput(
            "Sync window must be at least 1 day".to_string(),
        ));
    }

    let files = filter_modified(vault.list_markdown_notes().await?, window_days, now);
    let mut notes = Vec::with_capacity(files.len());

    for file in files {
        match vault.read_note_content(&file).await {
            Ok(Some(content)) => notes.push(Note {
                path: file.path,
                name: file.name,
                modified_at: file.modified_at,
                content,
            }),
            Ok(None) => tracing::debug!("Note {} has no content, skipping", file.path.display()),
            Err(e) => tracing::warn!("Failed to read {}: {}", file.path.display(), e),
        }
    }

    tracing::info!(
        "{} notes modified in the last {} day(s)",
        notes.len(),
        window_days
    );
    Ok(notes)
}
