use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

use super::error::{Entity, EngineError};

/// Persistence the scheduling core reads from and writes to.
///
/// Implementations own atomicity of individual writes; the core does no locking
/// of its own beyond per-instructor admission ordering.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn instructor(&self, id: Ulid) -> Result<Option<Instructor>, EngineError>;
    /// All instructors, or only those in `ids`. Missing ids are skipped.
    async fn instructors(&self, ids: Option<&[Ulid]>) -> Result<Vec<Instructor>, EngineError>;
    async fn save_instructor(&self, instructor: Instructor) -> Result<(), EngineError>;
    async fn delete_instructor(&self, id: Ulid) -> Result<bool, EngineError>;

    async fn student(&self, id: Ulid) -> Result<Option<Student>, EngineError>;
    async fn save_student(&self, student: Student) -> Result<(), EngineError>;
    async fn delete_student(&self, id: Ulid) -> Result<bool, EngineError>;

    async fn lesson(&self, id: Ulid) -> Result<Option<Lesson>, EngineError>;
    /// An instructor's lessons, optionally only those overlapping `within`.
    async fn lessons_for_instructor(
        &self,
        instructor_id: Ulid,
        within: Option<TimeRange>,
    ) -> Result<Vec<Lesson>, EngineError>;
    async fn lessons_for_student(&self, student_id: Ulid) -> Result<Vec<Lesson>, EngineError>;
    /// Every lesson overlapping `range`.
    async fn lessons_between(&self, range: TimeRange) -> Result<Vec<Lesson>, EngineError>;
    /// Insert, or replace the lesson with the same id.
    async fn save_lesson(&self, lesson: Lesson) -> Result<(), EngineError>;
    async fn delete_lesson(&self, id: Ulid) -> Result<bool, EngineError>;

    async fn request(&self, id: Ulid) -> Result<Option<LessonRequest>, EngineError>;
    async fn requests(&self, status: Option<RequestStatus>) -> Result<Vec<LessonRequest>, EngineError>;
    async fn requests_for_instructor(
        &self,
        instructor_id: Ulid,
    ) -> Result<Vec<LessonRequest>, EngineError>;
    /// Requests overlapping `range`, optionally filtered by status.
    async fn requests_between(
        &self,
        range: TimeRange,
        status: Option<RequestStatus>,
    ) -> Result<Vec<LessonRequest>, EngineError>;
    async fn pending_requests_for_student(&self, student_id: Ulid) -> Result<usize, EngineError>;
    async fn insert_request(&self, request: LessonRequest) -> Result<(), EngineError>;
    async fn set_request_status(&self, id: Ulid, status: RequestStatus) -> Result<(), EngineError>;
    /// Mark `id` approved and store `lesson` as one write.
    async fn approve_request(&self, id: Ulid, lesson: Lesson) -> Result<(), EngineError>;
    async fn delete_request(&self, id: Ulid) -> Result<bool, EngineError>;
}

/// DashMap-backed repository, optionally journaled to a WAL.
pub struct InMemoryStore {
    instructors: DashMap<Ulid, Instructor>,
    students: DashMap<Ulid, Student>,
    lessons: DashMap<Ulid, Lesson>,
    requests: DashMap<Ulid, LessonRequest>,
    /// instructor id → lesson ids
    lessons_by_instructor: DashMap<Ulid, Vec<Ulid>>,
    /// instructor id → request ids
    requests_by_instructor: DashMap<Ulid, Vec<Ulid>>,
    /// Held across append + apply so journal order is apply order.
    wal: Option<Mutex<Wal>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// A store with no journal. State lives only as long as the process.
    pub fn new() -> Self {
        Self {
            instructors: DashMap::new(),
            students: DashMap::new(),
            lessons: DashMap::new(),
            requests: DashMap::new(),
            lessons_by_instructor: DashMap::new(),
            requests_by_instructor: DashMap::new(),
            wal: None,
        }
    }

    /// Replay the journal at `path` and keep appending to it.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let replay = Wal::replay(path)?;
        if replay.torn_tail {
            warn!("journal {} had a torn tail; dropped it", path.display());
        }
        let mut store = Self::new();
        for event in &replay.events {
            store.apply_event(event);
        }
        store.wal = Some(Mutex::new(Wal::open(path, replay.events.len() as u64)?));
        info!(
            "replayed {} journal records: {} instructors, {} students, {} lessons, {} requests",
            replay.events.len(),
            store.instructors.len(),
            store.students.len(),
            store.lessons.len(),
            store.requests.len()
        );
        Ok(store)
    }

    /// Records in the journal, or 0 when unjournaled.
    pub async fn journal_records(&self) -> u64 {
        match &self.wal {
            Some(wal) => wal.lock().await.records(),
            None => 0,
        }
    }

    /// Rewrite the journal with just enough records to rebuild current state.
    pub async fn compact(&self) -> Result<(), EngineError> {
        let Some(wal) = &self.wal else { return Ok(()) };
        let mut wal = wal.lock().await;
        let events = self.snapshot_events();
        wal.compact(&events)
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        metrics::gauge!(crate::observability::JOURNAL_RECORDS).set(wal.records() as f64);
        info!("compacted journal {} to {} records", wal.path().display(), wal.records());
        Ok(())
    }

    fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        events.extend(
            self.instructors
                .iter()
                .map(|e| Event::InstructorSaved { instructor: e.value().clone() }),
        );
        events.extend(
            self.students
                .iter()
                .map(|e| Event::StudentSaved { student: e.value().clone() }),
        );
        events.extend(
            self.lessons
                .iter()
                .map(|e| Event::LessonSaved { lesson: e.value().clone() }),
        );
        events.extend(
            self.requests
                .iter()
                .map(|e| Event::RequestCreated { request: e.value().clone() }),
        );
        events
    }

    /// Journal `event`, then apply it.
    async fn persist_and_apply(&self, event: Event) -> Result<(), EngineError> {
        match &self.wal {
            Some(wal) => {
                let mut wal = wal.lock().await;
                wal.append(&event)
                    .map_err(|e| EngineError::Storage(e.to_string()))?;
                self.apply_event(&event);
                metrics::gauge!(crate::observability::JOURNAL_RECORDS).set(wal.records() as f64);
            }
            None => self.apply_event(&event),
        }
        Ok(())
    }

    // ── Event application ────────────────────────────────────

    fn apply_event(&self, event: &Event) {
        match event {
            Event::InstructorSaved { instructor } => {
                self.instructors.insert(instructor.id, instructor.clone());
            }
            Event::InstructorDeleted { id } => {
                self.instructors.remove(id);
            }
            Event::StudentSaved { student } => {
                self.students.insert(student.id, student.clone());
            }
            Event::StudentDeleted { id } => {
                self.students.remove(id);
            }
            Event::LessonSaved { lesson } => self.put_lesson(lesson.clone()),
            Event::LessonDeleted { id } => {
                if let Some((_, old)) = self.lessons.remove(id) {
                    unindex(&self.lessons_by_instructor, &old.instructor_id, id);
                }
            }
            Event::RequestCreated { request } => {
                index(&self.requests_by_instructor, request.instructor_id, request.id);
                self.requests.insert(request.id, request.clone());
            }
            Event::RequestStatusChanged { id, status } => {
                if let Some(mut request) = self.requests.get_mut(id) {
                    request.status = *status;
                }
            }
            Event::RequestApproved { id, lesson } => {
                if let Some(mut request) = self.requests.get_mut(id) {
                    request.status = RequestStatus::Approved;
                }
                self.put_lesson(lesson.clone());
            }
            Event::RequestDeleted { id } => {
                if let Some((_, old)) = self.requests.remove(id) {
                    unindex(&self.requests_by_instructor, &old.instructor_id, id);
                }
            }
        }
    }

    fn put_lesson(&self, lesson: Lesson) {
        let (id, instructor_id) = (lesson.id, lesson.instructor_id);
        if let Some(old) = self.lessons.insert(id, lesson)
            && old.instructor_id != instructor_id
        {
            unindex(&self.lessons_by_instructor, &old.instructor_id, &id);
        }
        index(&self.lessons_by_instructor, instructor_id, id);
    }

    fn indexed_lessons(&self, instructor_id: &Ulid) -> Vec<Lesson> {
        let ids = self
            .lessons_by_instructor
            .get(instructor_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.lessons.get(id).map(|e| e.value().clone()))
            .collect()
    }

    fn indexed_requests(&self, instructor_id: &Ulid) -> Vec<LessonRequest> {
        let ids = self
            .requests_by_instructor
            .get(instructor_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.requests.get(id).map(|e| e.value().clone()))
            .collect()
    }
}

fn index(map: &DashMap<Ulid, Vec<Ulid>>, key: Ulid, id: Ulid) {
    let mut ids = map.entry(key).or_default();
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn unindex(map: &DashMap<Ulid, Vec<Ulid>>, key: &Ulid, id: &Ulid) {
    if let Some(mut ids) = map.get_mut(key) {
        ids.retain(|i| i != id);
    }
}

fn by_start<T>(mut items: Vec<T>, range: impl Fn(&T) -> TimeRange) -> Vec<T> {
    items.sort_by_key(|i| range(i).start);
    items
}

#[async_trait]
impl Repository for InMemoryStore {
    async fn instructor(&self, id: Ulid) -> Result<Option<Instructor>, EngineError> {
        Ok(self.instructors.get(&id).map(|e| e.value().clone()))
    }

    async fn instructors(&self, ids: Option<&[Ulid]>) -> Result<Vec<Instructor>, EngineError> {
        let mut found: Vec<Instructor> = match ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.instructors.get(id).map(|e| e.value().clone()))
                .collect(),
            None => self.instructors.iter().map(|e| e.value().clone()).collect(),
        };
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        found.dedup_by_key(|i| i.id);
        Ok(found)
    }

    async fn save_instructor(&self, instructor: Instructor) -> Result<(), EngineError> {
        self.persist_and_apply(Event::InstructorSaved { instructor }).await
    }

    async fn delete_instructor(&self, id: Ulid) -> Result<bool, EngineError> {
        if !self.instructors.contains_key(&id) {
            return Ok(false);
        }
        self.persist_and_apply(Event::InstructorDeleted { id }).await?;
        Ok(true)
    }

    async fn student(&self, id: Ulid) -> Result<Option<Student>, EngineError> {
        Ok(self.students.get(&id).map(|e| e.value().clone()))
    }

    async fn save_student(&self, student: Student) -> Result<(), EngineError> {
        self.persist_and_apply(Event::StudentSaved { student }).await
    }

    async fn delete_student(&self, id: Ulid) -> Result<bool, EngineError> {
        if !self.students.contains_key(&id) {
            return Ok(false);
        }
        self.persist_and_apply(Event::StudentDeleted { id }).await?;
        Ok(true)
    }

    async fn lesson(&self, id: Ulid) -> Result<Option<Lesson>, EngineError> {
        Ok(self.lessons.get(&id).map(|e| e.value().clone()))
    }

    async fn lessons_for_instructor(
        &self,
        instructor_id: Ulid,
        within: Option<TimeRange>,
    ) -> Result<Vec<Lesson>, EngineError> {
        let mut lessons = self.indexed_lessons(&instructor_id);
        if let Some(window) = within {
            lessons.retain(|l| l.range().overlaps(&window));
        }
        Ok(by_start(lessons, Lesson::range))
    }

    async fn lessons_for_student(&self, student_id: Ulid) -> Result<Vec<Lesson>, EngineError> {
        let lessons = self
            .lessons
            .iter()
            .filter(|e| e.value().has_student(&student_id))
            .map(|e| e.value().clone())
            .collect();
        Ok(by_start(lessons, Lesson::range))
    }

    async fn lessons_between(&self, range: TimeRange) -> Result<Vec<Lesson>, EngineError> {
        let lessons = self
            .lessons
            .iter()
            .filter(|e| e.value().range().overlaps(&range))
            .map(|e| e.value().clone())
            .collect();
        Ok(by_start(lessons, Lesson::range))
    }

    async fn save_lesson(&self, lesson: Lesson) -> Result<(), EngineError> {
        self.persist_and_apply(Event::LessonSaved { lesson }).await
    }

    async fn delete_lesson(&self, id: Ulid) -> Result<bool, EngineError> {
        if !self.lessons.contains_key(&id) {
            return Ok(false);
        }
        self.persist_and_apply(Event::LessonDeleted { id }).await?;
        Ok(true)
    }

    async fn request(&self, id: Ulid) -> Result<Option<LessonRequest>, EngineError> {
        Ok(self.requests.get(&id).map(|e| e.value().clone()))
    }

    async fn requests(&self, status: Option<RequestStatus>) -> Result<Vec<LessonRequest>, EngineError> {
        let requests = self
            .requests
            .iter()
            .filter(|e| status.is_none_or(|s| e.value().status == s))
            .map(|e| e.value().clone())
            .collect();
        Ok(by_start(requests, LessonRequest::range))
    }

    async fn requests_for_instructor(
        &self,
        instructor_id: Ulid,
    ) -> Result<Vec<LessonRequest>, EngineError> {
        Ok(by_start(self.indexed_requests(&instructor_id), LessonRequest::range))
    }

    async fn requests_between(
        &self,
        range: TimeRange,
        status: Option<RequestStatus>,
    ) -> Result<Vec<LessonRequest>, EngineError> {
        let requests = self
            .requests
            .iter()
            .filter(|e| {
                let r = e.value();
                r.range().overlaps(&range) && status.is_none_or(|s| r.status == s)
            })
            .map(|e| e.value().clone())
            .collect();
        Ok(by_start(requests, LessonRequest::range))
    }

    async fn pending_requests_for_student(&self, student_id: Ulid) -> Result<usize, EngineError> {
        Ok(self
            .requests
            .iter()
            .filter(|e| e.value().is_pending() && e.value().student_ids.contains(&student_id))
            .count())
    }

    async fn insert_request(&self, request: LessonRequest) -> Result<(), EngineError> {
        self.persist_and_apply(Event::RequestCreated { request }).await
    }

    async fn set_request_status(&self, id: Ulid, status: RequestStatus) -> Result<(), EngineError> {
        if !self.requests.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Request, id));
        }
        self.persist_and_apply(Event::RequestStatusChanged { id, status }).await
    }

    async fn approve_request(&self, id: Ulid, lesson: Lesson) -> Result<(), EngineError> {
        if !self.requests.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Request, id));
        }
        self.persist_and_apply(Event::RequestApproved { id, lesson }).await
    }

    async fn delete_request(&self, id: Ulid) -> Result<bool, EngineError> {
        if !self.requests.contains_key(&id) {
            return Ok(false);
        }
        self.persist_and_apply(Event::RequestDeleted { id }).await?;
        Ok(true)
    }
}
