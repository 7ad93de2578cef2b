//! Test doubles for the store and the source.

use std::cell::{Cell, RefCell};

use crate::api::CandidateSource;
use crate::db::CandidateStore;
use crate::error::{NetworkError, StorageError};
use crate::models::{Candidate, Picture, Status};

pub fn candidate(name: &str) -> Candidate {
    Candidate {
        id: None,
        status: Status::Pending,
        note: String::new(),
        name: name.to_string(),
        picture: Picture {
            thumbnail: "https://randomuser.me/api/portraits/thumb/women/55.jpg".to_string(),
            medium: "https://randomuser.me/api/portraits/med/women/55.jpg".to_string(),
            large: "https://randomuser.me/api/portraits/women/55.jpg".to_string(),
        },
        application_date: "2022-03-02T23:29:20.591Z".to_string(),
        location: "4339 Miller Ave San Francisco, South Dakota 97739".to_string(),
        gender: "female".to_string(),
        age: 22,
    }
}

pub fn with_status(name: &str, status: Status) -> Candidate {
    Candidate {
        status,
        ..candidate(name)
    }
}

/// Store backed by a Vec, recording every `put`.
#[derive(Default)]
pub struct MemoryStore {
    records: RefCell<Vec<Candidate>>,
    puts: RefCell<Vec<Candidate>>,
    next_id: Cell<i64>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn with(candidates: Vec<Candidate>) -> Self {
        let store = Self::default();
        store.next_id.set(131);
        for c in &candidates {
            store.add(c).unwrap();
        }
        store
    }

    pub fn puts(&self) -> Vec<Candidate> {
        self.puts.borrow().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Io(std::io::Error::other("store unavailable")));
        }
        Ok(())
    }
}

impl CandidateStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Candidate>, StorageError> {
        Ok(self.records.borrow().clone())
    }

    fn add(&self, candidate: &Candidate) -> Result<Candidate, StorageError> {
        self.check_writable()?;
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let saved = Candidate {
            id: Some(id),
            ..candidate.clone()
        };
        self.records.borrow_mut().push(saved.clone());
        Ok(saved)
    }

    fn put(&self, candidate: &Candidate) -> Result<(), StorageError> {
        self.check_writable()?;
        let id = candidate.id.ok_or(StorageError::MissingId)?;
        self.puts.borrow_mut().push(candidate.clone());
        let mut records = self.records.borrow_mut();
        match records.iter_mut().find(|c| c.id == Some(id)) {
            Some(existing) => *existing = candidate.clone(),
            None => records.push(candidate.clone()),
        }
        Ok(())
    }
}

/// Store whose backing storage is gone.
pub struct FailingStore;

impl CandidateStore for FailingStore {
    fn load_all(&self) -> Result<Vec<Candidate>, StorageError> {
        Err(StorageError::NotInitialized)
    }

    fn add(&self, _candidate: &Candidate) -> Result<Candidate, StorageError> {
        Err(StorageError::NotInitialized)
    }

    fn put(&self, _candidate: &Candidate) -> Result<(), StorageError> {
        Err(StorageError::NotInitialized)
    }
}

/// Source that hands out a fixed batch, or fails.
pub struct StaticSource {
    batch: Option<Vec<Candidate>>,
}

impl StaticSource {
    pub fn new(batch: Vec<Candidate>) -> Self {
        Self { batch: Some(batch) }
    }

    pub fn failing() -> Self {
        Self { batch: None }
    }
}

impl CandidateSource for StaticSource {
    fn fetch_batch(&self) -> Result<Vec<Candidate>, NetworkError> {
        self.batch.clone().ok_or_else(|| NetworkError::Payload {
            url: "https://randomuser.me/api".to_string(),
            details: "service unavailable".to_string(),
        })
    }
}
