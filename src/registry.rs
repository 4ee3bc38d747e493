//! The in-memory file registry and the per-file state machine.
//!
//! ```text
//!            Reading            Extracted             Completed
//!   IDLE ───────────▶ READING ───────────▶ PROCESSING ───────────▶ COMPLETED
//!                        │                     │
//!                        │ Failed              │ Failed
//!                        └─────────────────────┴──────────────────▶ ERROR
//! ```
//!
//! A pipeline never touches a [`TrackedFile`] directly. It sends one
//! [`StageUpdate`] per transition to [`Registry::apply`], which checks the
//! transition against the entry's current state and applies it in one step.
//! Updates addressed to an entry that has been removed are dropped silently.
//!
//! The per-entry state is an enum whose terminal variants carry the profile
//! or the error text, so "result iff COMPLETED" and "error iff ERROR" hold by
//! construction.
//!
//! Selection is a plain [`FileId`] that is re-validated on every read.

use crate::editor;
use crate::error::BioCraftError;
use crate::pipeline::input::UploadedFile;
use crate::profile::{FieldKey, StructuredProfile};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

// ── Identifiers ──────────────────────────────────────────────────────────

/// Opaque, unique identifier of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Processing status of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Idle,
    Reading,
    Processing,
    Completed,
    Error,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Error)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingStatus::Idle => "IDLE",
            ProcessingStatus::Reading => "READING",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Completed => "COMPLETED",
            ProcessingStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

// ── Tracked file ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum FileState {
    Idle,
    Reading,
    Processing,
    Completed(StructuredProfile),
    Error(String),
}

impl FileState {
    fn status(&self) -> ProcessingStatus {
        match self {
            FileState::Idle => ProcessingStatus::Idle,
            FileState::Reading => ProcessingStatus::Reading,
            FileState::Processing => ProcessingStatus::Processing,
            FileState::Completed(_) => ProcessingStatus::Completed,
            FileState::Error(_) => ProcessingStatus::Error,
        }
    }
}

/// One uploaded document's processing record.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    id: FileId,
    source: UploadedFile,
    raw_text: String,
    state: FileState,
}

impl TrackedFile {
    fn new(source: UploadedFile) -> Self {
        Self {
            id: FileId::new(),
            source,
            raw_text: String::new(),
            state: FileState::Idle,
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    /// The original upload. Never mutated.
    pub fn source(&self) -> &UploadedFile {
        &self.source
    }

    pub fn file_name(&self) -> &str {
        &self.source.name
    }

    /// Extracted text; empty until extraction succeeds.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn status(&self) -> ProcessingStatus {
        self.state.status()
    }

    /// The profile, present only when COMPLETED.
    pub fn result(&self) -> Option<&StructuredProfile> {
        match &self.state {
            FileState::Completed(profile) => Some(profile),
            _ => None,
        }
    }

    /// The failure message, present only when ERROR.
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            FileState::Error(message) => Some(message),
            _ => None,
        }
    }

    fn profile_mut(&mut self) -> Result<&mut StructuredProfile, BioCraftError> {
        let status = self.status();
        match &mut self.state {
            FileState::Completed(profile) => Ok(profile),
            _ => Err(BioCraftError::NotCompleted {
                id: self.id,
                status,
            }),
        }
    }
}

// ── Stage updates ────────────────────────────────────────────────────────

/// One state transition, sent by a pipeline to the registry.
#[derive(Debug, Clone)]
pub enum StageUpdate {
    /// Extraction has started.
    Reading,
    /// Extraction succeeded; classification is starting.
    Extracted { raw_text: String },
    /// Classification succeeded.
    Completed(StructuredProfile),
    /// Any stage failed.
    Failed(String),
}

impl StageUpdate {
    /// The status an entry has after this update is applied.
    pub fn target_status(&self) -> ProcessingStatus {
        match self {
            StageUpdate::Reading => ProcessingStatus::Reading,
            StageUpdate::Extracted { .. } => ProcessingStatus::Processing,
            StageUpdate::Completed(_) => ProcessingStatus::Completed,
            StageUpdate::Failed(_) => ProcessingStatus::Error,
        }
    }

    fn is_legal_from(&self, from: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        match self {
            StageUpdate::Reading => from == Idle,
            StageUpdate::Extracted { .. } => from == Reading,
            StageUpdate::Completed(_) => from == Processing,
            StageUpdate::Failed(_) => !from.is_terminal(),
        }
    }
}

/// What [`Registry::apply`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The entry moved to `status`. `auto_selected` is set when a completion
    /// took the empty selection.
    Applied {
        status: ProcessingStatus,
        auto_selected: bool,
    },
    /// No entry with that id; the update was dropped.
    Removed,
    /// The transition is not legal from the entry's current state.
    Rejected {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Ordered collection of tracked files plus the current selection.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<TrackedFile>,
    selected: Option<FileId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track one upload. The new entry is IDLE and appended last.
    pub fn insert(&mut self, source: UploadedFile) -> FileId {
        let entry = TrackedFile::new(source);
        let id = entry.id;
        debug!("Tracking '{}' as {}", entry.file_name(), id);
        self.entries.push(entry);
        id
    }

    /// Track a batch in one mutation, preserving its order.
    pub fn insert_batch(&mut self, sources: Vec<UploadedFile>) -> Vec<FileId> {
        self.entries.reserve(sources.len());
        sources.into_iter().map(|s| self.insert(s)).collect()
    }

    /// Apply one stage transition to one entry.
    pub fn apply(&mut self, id: FileId, update: StageUpdate) -> ApplyOutcome {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            debug!("Dropping {} update for removed file {}", update.target_status(), id);
            return ApplyOutcome::Removed;
        };

        let from = entry.status();
        let to = update.target_status();
        if !update.is_legal_from(from) {
            warn!("Illegal transition {} → {} for file {}", from, to, id);
            return ApplyOutcome::Rejected { from, to };
        }

        entry.state = match update {
            StageUpdate::Reading => FileState::Reading,
            StageUpdate::Extracted { raw_text } => {
                entry.raw_text = raw_text;
                FileState::Processing
            }
            StageUpdate::Completed(profile) => FileState::Completed(profile),
            StageUpdate::Failed(message) => FileState::Error(message),
        };
        debug!("File {}: {} → {}", id, from, to);

        let auto_selected = to == ProcessingStatus::Completed && self.selected_id().is_none();
        if auto_selected {
            self.selected = Some(id);
        }
        ApplyOutcome::Applied {
            status: to,
            auto_selected,
        }
    }

    /// Select any id. Validity is checked when the selection is read.
    pub fn select(&mut self, id: FileId) {
        self.selected = Some(id);
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The selected id, if it names a tracked entry.
    pub fn selected_id(&self) -> Option<FileId> {
        self.selected.filter(|id| self.contains(*id))
    }

    pub fn selected(&self) -> Option<&TrackedFile> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Remove an entry. If it was selected, the selection moves to the first
    /// remaining entry, or to none.
    pub fn remove(&mut self, id: FileId) -> Option<TrackedFile> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let removed = self.entries.remove(index);
        if self.selected == Some(id) {
            self.selected = self.entries.first().map(|e| e.id);
        }
        debug!("Removed file {} ('{}')", id, removed.file_name());
        Some(removed)
    }

    pub fn get(&self, id: FileId) -> Option<&TrackedFile> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedFile> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Editor operations ────────────────────────────────────────────────

    /// The completed profile of `id`.
    pub fn profile(&self, id: FileId) -> Result<&StructuredProfile, BioCraftError> {
        let entry = self.get(id).ok_or(BioCraftError::UnknownFile { id })?;
        entry.result().ok_or(BioCraftError::NotCompleted {
            id,
            status: entry.status(),
        })
    }

    fn profile_mut(&mut self, id: FileId) -> Result<&mut StructuredProfile, BioCraftError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(BioCraftError::UnknownFile { id })?
            .profile_mut()
    }

    /// Replace one field of a completed profile with parsed editor input.
    pub fn update_field(
        &mut self,
        id: FileId,
        key: FieldKey,
        input: &str,
    ) -> Result<(), BioCraftError> {
        let profile = self.profile_mut(id)?;
        editor::apply_edit(profile, key, input)?;
        debug!("File {}: edited '{}'", id, key);
        Ok(())
    }

    /// Attach a portrait to a completed profile.
    pub fn set_profile_image(&mut self, id: FileId, bytes: &[u8]) -> Result<(), BioCraftError> {
        let profile = self.profile_mut(id)?;
        editor::attach_image(profile, bytes)
    }

    /// Detach the portrait of a completed profile.
    pub fn clear_profile_image(&mut self, id: FileId) -> Result<(), BioCraftError> {
        self.profile_mut(id)?.profile_image = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Category;

    fn upload(name: &str) -> UploadedFile {
        UploadedFile::from_name(name, b"PK\x03\x04".to_vec())
    }

    fn profile(name: &str) -> StructuredProfile {
        StructuredProfile {
            name: name.into(),
            ..Default::default()
        }
    }

    fn complete(reg: &mut Registry, id: FileId, name: &str) -> ApplyOutcome {
        reg.apply(id, StageUpdate::Reading);
        reg.apply(
            id,
            StageUpdate::Extracted {
                raw_text: format!("{name} bio"),
            },
        );
        reg.apply(id, StageUpdate::Completed(profile(name)))
    }

    fn assert_invariants(reg: &Registry) {
        for e in reg.iter() {
            assert_eq!(e.result().is_some(), e.status() == ProcessingStatus::Completed);
            assert_eq!(e.error_message().is_some(), e.status() == ProcessingStatus::Error);
        }
    }

    #[test]
    fn status_display_is_uppercase() {
        assert_eq!(ProcessingStatus::Idle.to_string(), "IDLE");
        assert_eq!(ProcessingStatus::Error.to_string(), "ERROR");
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
    }

    #[test]
    fn batch_entries_start_idle_in_order() {
        let mut reg = Registry::new();
        let ids = reg.insert_batch(vec![upload("a.docx"), upload("b.docx"), upload("c.docx")]);
        assert_eq!(ids.len(), 3);
        let names: Vec<&str> = reg.iter().map(|e| e.file_name()).collect();
        assert_eq!(names, vec!["a.docx", "b.docx", "c.docx"]);
        assert!(reg.iter().all(|e| e.status() == ProcessingStatus::Idle));
        assert_ne!(ids[0], ids[1]);
        assert_invariants(&reg);
    }

    #[test]
    fn full_success_path() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));

        assert!(matches!(
            reg.apply(id, StageUpdate::Reading),
            ApplyOutcome::Applied { status: ProcessingStatus::Reading, .. }
        ));
        assert_invariants(&reg);
        reg.apply(id, StageUpdate::Extracted { raw_text: "张三 教授".into() });
        assert_eq!(reg.get(id).unwrap().raw_text(), "张三 教授");
        assert_invariants(&reg);
        reg.apply(id, StageUpdate::Completed(profile("张三")));

        let entry = reg.get(id).unwrap();
        assert_eq!(entry.status(), ProcessingStatus::Completed);
        assert_eq!(entry.result().unwrap().name, "张三");
        assert!(entry.error_message().is_none());
    }

    #[test]
    fn stages_cannot_be_skipped_or_reordered() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));

        let out = reg.apply(id, StageUpdate::Completed(profile("x")));
        assert_eq!(
            out,
            ApplyOutcome::Rejected {
                from: ProcessingStatus::Idle,
                to: ProcessingStatus::Completed
            }
        );
        reg.apply(id, StageUpdate::Reading);
        assert!(matches!(
            reg.apply(id, StageUpdate::Reading),
            ApplyOutcome::Rejected { .. }
        ));
        assert_eq!(reg.get(id).unwrap().status(), ProcessingStatus::Reading);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));
        reg.apply(id, StageUpdate::Reading);
        reg.apply(id, StageUpdate::Failed("corrupt".into()));

        assert!(matches!(
            reg.apply(id, StageUpdate::Failed("again".into())),
            ApplyOutcome::Rejected { .. }
        ));
        let entry = reg.get(id).unwrap();
        assert_eq!(entry.error_message(), Some("corrupt"));
        assert!(entry.raw_text().is_empty());
        assert_invariants(&reg);
    }

    #[test]
    fn update_for_removed_entry_is_a_noop() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));
        reg.apply(id, StageUpdate::Reading);
        reg.remove(id);

        assert_eq!(reg.apply(id, StageUpdate::Failed("late".into())), ApplyOutcome::Removed);
        assert!(reg.is_empty());
        assert_eq!(reg.selected_id(), None);
    }

    #[test]
    fn select_accepts_unknown_ids_but_reads_validate() {
        let mut reg = Registry::new();
        reg.insert(upload("a.docx"));
        reg.select(FileId::new());
        assert_eq!(reg.selected_id(), None);
        assert!(reg.selected().is_none());
    }

    #[test]
    fn removing_selected_moves_to_first_remaining() {
        let mut reg = Registry::new();
        let ids = reg.insert_batch(vec![upload("a.docx"), upload("b.docx"), upload("c.docx")]);

        reg.select(ids[1]);
        reg.remove(ids[1]);
        assert_eq!(reg.selected_id(), Some(ids[0]));

        reg.remove(ids[0]);
        assert_eq!(reg.selected_id(), Some(ids[2]));

        reg.remove(ids[2]);
        assert_eq!(reg.selected_id(), None);
    }

    #[test]
    fn removing_unselected_keeps_selection() {
        let mut reg = Registry::new();
        let ids = reg.insert_batch(vec![upload("a.docx"), upload("b.docx")]);
        reg.select(ids[1]);
        reg.remove(ids[0]);
        assert_eq!(reg.selected_id(), Some(ids[1]));
    }

    #[test]
    fn first_completion_is_auto_selected_only_once() {
        let mut reg = Registry::new();
        let ids = reg.insert_batch(vec![upload("a.docx"), upload("b.docx")]);

        let out = complete(&mut reg, ids[1], "乙");
        assert_eq!(
            out,
            ApplyOutcome::Applied {
                status: ProcessingStatus::Completed,
                auto_selected: true
            }
        );
        let out = complete(&mut reg, ids[0], "甲");
        assert_eq!(
            out,
            ApplyOutcome::Applied {
                status: ProcessingStatus::Completed,
                auto_selected: false
            }
        );
        assert_eq!(reg.selected_id(), Some(ids[1]));
    }

    #[test]
    fn stale_selection_does_not_block_auto_select() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));
        reg.select(FileId::new());
        complete(&mut reg, id, "甲");
        assert_eq!(reg.selected_id(), Some(id));
    }

    #[test]
    fn failure_does_not_auto_select() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));
        reg.apply(id, StageUpdate::Reading);
        reg.apply(id, StageUpdate::Failed("boom".into()));
        assert_eq!(reg.selected_id(), None);
    }

    #[test]
    fn edits_require_completed_entry() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));
        reg.apply(id, StageUpdate::Reading);

        let err = reg
            .update_field(id, Category::Career.into(), "北京大学")
            .unwrap_err();
        assert!(matches!(
            err,
            BioCraftError::NotCompleted {
                status: ProcessingStatus::Reading,
                ..
            }
        ));
        assert!(matches!(
            reg.update_field(FileId::new(), FieldKey::Name, "x"),
            Err(BioCraftError::UnknownFile { .. })
        ));
    }

    #[test]
    fn edit_keeps_status_and_other_fields() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));
        complete(&mut reg, id, "张三");

        reg.update_field(id, Category::Education.into(), "北京大学 博士\n\n清华大学 硕士 ")
            .unwrap();
        let entry = reg.get(id).unwrap();
        assert_eq!(entry.status(), ProcessingStatus::Completed);
        let p = entry.result().unwrap();
        assert_eq!(p.education, vec!["北京大学 博士", "清华大学 硕士"]);
        assert_eq!(p.name, "张三");
        assert!(p.career.is_empty());
    }

    #[test]
    fn portrait_can_be_set_and_cleared() {
        let mut reg = Registry::new();
        let id = reg.insert(upload("a.docx"));
        complete(&mut reg, id, "张三");

        assert!(reg.set_profile_image(id, b"not an image").is_err());
        reg.set_profile_image(id, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();
        assert!(reg
            .profile(id)
            .unwrap()
            .profile_image
            .as_deref()
            .unwrap()
            .starts_with("data:image/png;base64,"));

        reg.clear_profile_image(id).unwrap();
        assert!(reg.profile(id).unwrap().profile_image.is_none());
    }
}
