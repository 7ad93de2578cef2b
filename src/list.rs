use tracing::{debug, info, warn};

use crate::api::CandidateSource;
use crate::db::CandidateStore;
use crate::error::{Error, StorageError};
use crate::models::{Candidate, Filter, Status};

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Loading,
    Loaded(Loaded),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub candidates: Vec<Candidate>,
    pub filter: Filter,
    /// Index into `candidates`; may point at a candidate the filter hides.
    pub selected_index: Option<usize>,
    pub fetching_more: bool,
}

impl Loaded {
    fn replace_by_id(&mut self, index: usize, updated: Candidate) {
        match updated.id {
            Some(id) => {
                for candidate in self.candidates.iter_mut() {
                    if candidate.id == Some(id) {
                        *candidate = updated.clone();
                    }
                }
            }
            // never persisted, so its position is the only handle we have
            None => self.candidates[index] = updated,
        }
    }

    /// Nearest candidate matching `status`, looking forward of `from` first and then behind it.
    fn nearest_with_status(&self, from: usize, status: Status) -> Option<usize> {
        let forward = (from + 1..self.candidates.len()).find(|&i| self.candidates[i].status == status);
        forward.or_else(|| (0..from).rev().find(|&i| self.candidates[i].status == status))
    }
}

pub fn filter_announcement(count: usize) -> String {
    format!(
        "Filtered to {} candidate{}.",
        count,
        if count == 1 { "" } else { "s" }
    )
}

/// The candidate list: collection, filter, selection and fetch flag.
#[derive(Debug)]
pub struct CandidateList {
    state: ListState,
    announcement: String,
}

impl Default for CandidateList {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateList {
    pub fn new() -> Self {
        Self {
            state: ListState::Loading,
            announcement: String::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ListState::Loaded(_))
    }

    /// Last human-readable status message (currently only filter changes produce one).
    pub fn announcement(&self) -> &str {
        &self.announcement
    }

    fn loaded(&self) -> Option<&Loaded> {
        match &self.state {
            ListState::Loaded(loaded) => Some(loaded),
            ListState::Loading => None,
        }
    }

    fn loaded_mut(&mut self) -> Option<&mut Loaded> {
        match &mut self.state {
            ListState::Loaded(loaded) => Some(loaded),
            ListState::Loading => None,
        }
    }

    pub fn load(&mut self, store: &impl CandidateStore) -> Result<(), StorageError> {
        let candidates = store.load_all()?;
        let selected_index = if candidates.is_empty() { None } else { Some(0) };
        debug!(count = candidates.len(), "candidate list loaded");
        self.state = ListState::Loaded(Loaded {
            candidates,
            filter: Filter::All,
            selected_index,
            fetching_more: false,
        });
        Ok(())
    }

    // --- derived views ---

    pub fn candidates(&self) -> &[Candidate] {
        self.loaded().map(|l| l.candidates.as_slice()).unwrap_or(&[])
    }

    pub fn filter(&self) -> Filter {
        self.loaded().map(|l| l.filter).unwrap_or_default()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.loaded().and_then(|l| l.selected_index)
    }

    pub fn fetching_more(&self) -> bool {
        self.loaded().is_some_and(|l| l.fetching_more)
    }

    /// Candidates passing the current filter, paired with their index in the full collection.
    pub fn visible(&self) -> Vec<(usize, &Candidate)> {
        let filter = self.filter();
        self.candidates()
            .iter()
            .enumerate()
            .filter(|(_, c)| filter.matches(c))
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        count_matching(self.candidates(), self.filter())
    }

    pub fn selected(&self) -> Option<(usize, &Candidate)> {
        let loaded = self.loaded()?;
        let index = loaded.selected_index?;
        loaded.candidates.get(index).map(|c| (index, c))
    }

    pub fn position_of(&self, id: i64) -> Option<usize> {
        self.candidates().iter().position(|c| c.id == Some(id))
    }

    // --- intents ---

    pub fn select_filter(&mut self, filter: Filter) {
        let Some(loaded) = self.loaded_mut() else { return };
        loaded.filter = filter;
        loaded.selected_index = None;
        let count = count_matching(&loaded.candidates, filter);
        self.announcement = filter_announcement(count);
        debug!(filter = filter.label(), count, "filter changed");
    }

    /// Select `index`, or clear the selection if it is already selected.
    pub fn select_candidate(&mut self, index: usize) {
        let Some(loaded) = self.loaded_mut() else { return };
        if index >= loaded.candidates.len() {
            warn!(index, len = loaded.candidates.len(), "ignoring selection past end of list");
            return;
        }
        loaded.selected_index = if loaded.selected_index == Some(index) {
            None
        } else {
            Some(index)
        };
    }

    /// Mark a fetch as in flight. Returns false when there is no list to append to yet.
    pub fn begin_fetch(&mut self) -> bool {
        match self.loaded_mut() {
            Some(loaded) => {
                loaded.fetching_more = true;
                true
            }
            None => false,
        }
    }

    /// Append stored candidates from a finished fetch and clear the in-flight flag.
    pub fn finish_fetch(&mut self, new_candidates: Vec<Candidate>) {
        let Some(loaded) = self.loaded_mut() else { return };
        info!(count = new_candidates.len(), "appending new candidates");
        loaded.candidates.extend(new_candidates);
        loaded.fetching_more = false;
    }

    /// Fetch a batch, store it and append it. On failure `fetching_more` stays set.
    pub fn find_new_candidates(
        &mut self,
        source: &impl CandidateSource,
        store: &impl CandidateStore,
    ) -> Result<(), Error> {
        if !self.begin_fetch() {
            return Ok(());
        }
        let batch = source.fetch_batch()?;
        let stored = store.add_all(batch)?;
        self.finish_fetch(stored);
        Ok(())
    }

    /// Replace the selected candidate's note. The in-memory list is updated
    /// before the write, and stays updated if the write fails.
    pub fn save_note(&mut self, note: &str, store: &impl CandidateStore) -> Result<(), StorageError> {
        let Some(loaded) = self.loaded_mut() else { return Ok(()) };
        let Some(index) = loaded.selected_index else { return Ok(()) };

        let updated = Candidate {
            note: note.to_string(),
            ..loaded.candidates[index].clone()
        };
        loaded.replace_by_id(index, updated.clone());
        store.put(&updated)
    }

    /// Set the selected candidate's status (or reset it to pending if it
    /// already has it) and move the selection along a filtered view.
    pub fn save_status(&mut self, status: Status, store: &impl CandidateStore) -> Result<(), StorageError> {
        let Some(loaded) = self.loaded_mut() else { return Ok(()) };
        let Some(index) = loaded.selected_index else { return Ok(()) };

        let current = &loaded.candidates[index];
        let updated = Candidate {
            status: current.status.toggled(status),
            ..current.clone()
        };

        let next = match loaded.filter.status() {
            None => Some(index),
            Some(wanted) => loaded.nearest_with_status(index, wanted),
        };

        debug!(
            id = ?updated.id,
            from = %current.status,
            to = %updated.status,
            ?next,
            "status changed"
        );
        loaded.replace_by_id(index, updated.clone());
        loaded.selected_index = next;
        store.put(&updated)
    }
}

fn count_matching(candidates: &[Candidate], filter: Filter) -> usize {
    candidates.iter().filter(|c| filter.matches(c)).count()
}
