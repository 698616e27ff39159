//! In-memory student store.
//! The collection is owned by the store and handed out as copies, so callers never alias it.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{AppError, Student};

#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Every student in insertion order. Always succeeds.
    async fn list_all(&self) -> Vec<Student>;
}

/// Records present at process start.
pub fn seed_students() -> Vec<Student> {
    vec![Student::new(1, "navin", 60), Student::new(2, "Rahul", 64)]
}

#[derive(Debug, Default)]
pub struct InMemoryStudentStore {
    inner: Arc<RwLock<Vec<Student>>>,
}

impl InMemoryStudentStore {
    /// Builds a store over `students`, rejecting duplicate ids.
    pub fn new(students: Vec<Student>) -> Result<Self, AppError> {
        let mut seen = HashSet::with_capacity(students.len());
        if let Some(dup) = students.iter().find(|s| !seen.insert(s.id)) {
            return Err(AppError::Validation(format!("duplicate student id {}", dup.id)));
        }
        Ok(Self { inner: Arc::new(RwLock::new(students)) })
    }

    pub fn seeded() -> Result<Self, AppError> {
        Self::new(seed_students())
    }
}

#[async_trait]
impl StudentStore for InMemoryStudentStore {
    async fn list_all(&self) -> Vec<Student> {
        self.inner.read().await.clone()
    }
}
