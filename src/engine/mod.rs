mod admission;
mod availability;
mod conflict;
mod eligibility;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod store;

pub use availability::{
    day_range, fits_in, free_slots, project_onto, subtract, sweep, validate_and_sort_availability,
    week_dates, week_range, week_start,
};
pub use eligibility::Participant;
pub use error::{ConflictError, EngineError, Entity, ValidationError};
pub use lifecycle::Decision;
pub use store::{InMemoryStore, Repository};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::clock::Clock;
use crate::model::*;

/// The availability and scheduling core.
///
/// Built once at startup around a repository and a clock, then shared by handle.
pub struct Engine {
    store: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    /// Admissions for one instructor run one at a time within this engine, so an
    /// overlap check and the write it guards cannot interleave with another's.
    admission_locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(store: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            admission_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Repository> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Acquire admission locks for `instructor_ids` in sorted order to prevent deadlocks.
    ///
    /// Ids with no stored instructor are skipped; admission reports them as not found.
    pub(super) async fn lock_instructors(
        &self,
        instructor_ids: &[Ulid],
    ) -> Result<Vec<OwnedMutexGuard<()>>, EngineError> {
        let mut ids = instructor_ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            if self.store.instructor(id).await?.is_none() {
                continue;
            }
            let lock = self.admission_locks.entry(id).or_default().clone();
            guards.push(lock.lock_owned().await);
        }
        Ok(guards)
    }

    pub(super) async fn require_instructor(&self, id: Ulid) -> Result<Instructor, EngineError> {
        self.store
            .instructor(id)
            .await?
            .ok_or(EngineError::NotFound(Entity::Instructor, id))
    }

    pub(super) async fn require_student(&self, id: Ulid) -> Result<Student, EngineError> {
        self.store
            .student(id)
            .await?
            .ok_or(EngineError::NotFound(Entity::Student, id))
    }

    pub(super) async fn require_lesson(&self, id: Ulid) -> Result<Lesson, EngineError> {
        self.store
            .lesson(id)
            .await?
            .ok_or(EngineError::NotFound(Entity::Lesson, id))
    }

    pub(super) async fn require_request(&self, id: Ulid) -> Result<LessonRequest, EngineError> {
        self.store
            .request(id)
            .await?
            .ok_or(EngineError::NotFound(Entity::Request, id))
    }
}
