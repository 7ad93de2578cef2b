use crate::db::CandidateStore;
use crate::error::StorageError;
use crate::list::CandidateList;
use crate::models::Status;

/// Which candidate the buffer belongs to: its position plus its id, so a
/// different record landing at the same position still counts as a change.
type Identity = (usize, Option<i64>);

/// Local, uncommitted copy of the selected candidate's note.
#[derive(Debug, Default)]
pub struct NoteEditor {
    text: String,
    editing: Option<Identity>,
}

impl NoteEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn backspace(&mut self) {
        self.text.pop();
    }

    /// Follow the list's selection. When a different candidate is selected the
    /// local edit is dropped in favour of that candidate's stored note; other
    /// changes to the same candidate keep it. Returns true if the buffer was reset.
    pub fn sync(&mut self, list: &CandidateList) -> bool {
        let selected = list.selected();
        let identity = selected.map(|(index, c)| (index, c.id));
        if identity == self.editing {
            return false;
        }
        self.editing = identity;
        self.text = selected.map(|(_, c)| c.note.clone()).unwrap_or_default();
        true
    }

    /// Write the buffer to the selected candidate (leaving the note field).
    pub fn commit(&mut self, list: &mut CandidateList, store: &impl CandidateStore) -> Result<(), StorageError> {
        self.sync(list);
        list.save_note(&self.text, store)
    }

    /// Approve/reject from the detail view. The buffer is saved first so text
    /// typed but not yet committed lands on the candidate it was typed for,
    /// not on whichever candidate the list advances to. Both edits are applied
    /// in memory even if a write fails; the first write error is returned.
    pub fn toggle_status(
        &mut self,
        status: Status,
        list: &mut CandidateList,
        store: &impl CandidateStore,
    ) -> Result<(), StorageError> {
        self.sync(list);
        let note = list.save_note(&self.text, store);
        let status = list.save_status(status, store);
        self.sync(list);
        note.and(status)
    }
}
