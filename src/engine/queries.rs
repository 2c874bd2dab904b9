use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;
use crate::observability::QUERY_DURATION_SECONDS;

use super::availability::{busy_on, day_range, free_slots, week_dates, week_range, week_start};
use super::error::ValidationError;
use super::{Engine, EngineError, Entity};

impl Engine {
    /// Free slots for one instructor on `date`. Only confirmed lessons are busy.
    pub async fn available_hours_for_instructor(
        &self,
        instructor_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, EngineError> {
        let started = Instant::now();
        let instructor = self.require_instructor(instructor_id).await?;
        let free = self.free_hours(&instructor, date, None).await;
        metrics::histogram!(QUERY_DURATION_SECONDS, "query" => "available_hours")
            .record(started.elapsed().as_secs_f64());
        free
    }

    /// Free slots for `instructor` on `date`, ignoring the lesson `exclude`.
    pub(super) async fn free_hours(
        &self,
        instructor: &Instructor,
        date: NaiveDate,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Slot>, EngineError> {
        let lessons = self
            .store
            .lessons_for_instructor(instructor.id, Some(day_range(date)?))
            .await?;
        let busy = busy_on(
            lessons
                .iter()
                .filter(|l| Some(l.id) != exclude)
                .map(Lesson::range),
            date,
        );
        Ok(free_slots(Day::of(date), &instructor.working_hours, &busy))
    }

    /// Per-instructor, per-day free slots for the Sunday–Saturday week containing `date`.
    ///
    /// Only weeks after the current one may be queried. Confirmed lessons and pending
    /// requests both block time. Instructors teaching none of `styles` are listed with
    /// empty days; an empty `styles` filters nobody out.
    pub async fn weekly_availability(
        &self,
        date: NaiveDate,
        instructor_ids: Option<&[Ulid]>,
        styles: &[Style],
    ) -> Result<Vec<InstructorWeek>, EngineError> {
        let today = self.now().date_naive();
        if week_start(date)? <= week_start(today)? {
            return Err(ValidationError::NotFutureWeek { date }.into());
        }

        let started = Instant::now();
        let window = week_range(date)?;
        let (instructors, lessons, pending) = tokio::try_join!(
            self.store.instructors(instructor_ids),
            self.store.lessons_between(window),
            self.store.requests_between(window, Some(RequestStatus::Pending)),
        )?;

        if let Some(ids) = instructor_ids
            && let Some(missing) = ids.iter().find(|id| !instructors.iter().any(|i| i.id == **id))
        {
            return Err(EngineError::NotFound(Entity::Instructor, *missing));
        }

        let mut busy: HashMap<Ulid, Vec<TimeRange>> = HashMap::new();
        for l in &lessons {
            busy.entry(l.instructor_id).or_default().push(l.range());
        }
        for r in &pending {
            busy.entry(r.instructor_id).or_default().push(r.range());
        }

        let dates = week_dates(date)?;
        let report = instructors
            .into_iter()
            .map(|instructor| {
                let bookable =
                    styles.is_empty() || styles.iter().any(|s| instructor.expertise.contains(s));
                let ranges = busy.get(&instructor.id).map(Vec::as_slice).unwrap_or_default();
                let days = dates
                    .iter()
                    .map(|&d| {
                        let day = Day::of(d);
                        let slots = if bookable {
                            free_slots(day, &instructor.working_hours, &busy_on(ranges.iter().copied(), d))
                        } else {
                            Vec::new()
                        };
                        DayAvailability { day, date: d, slots }
                    })
                    .collect();
                InstructorWeek {
                    instructor_id: instructor.id,
                    name: instructor.name,
                    days,
                }
            })
            .collect();

        metrics::histogram!(QUERY_DURATION_SECONDS, "query" => "weekly_availability")
            .record(started.elapsed().as_secs_f64());
        Ok(report)
    }

    pub async fn get_instructor(&self, id: Ulid) -> Result<Instructor, EngineError> {
        self.require_instructor(id).await
    }

    pub async fn list_instructors(&self) -> Result<Vec<Instructor>, EngineError> {
        self.store.instructors(None).await
    }

    pub async fn get_student(&self, id: Ulid) -> Result<Student, EngineError> {
        self.require_student(id).await
    }

    pub async fn get_lesson(&self, id: Ulid) -> Result<Lesson, EngineError> {
        self.require_lesson(id).await
    }

    pub async fn lessons_for_instructor(&self, instructor_id: Ulid) -> Result<Vec<Lesson>, EngineError> {
        self.require_instructor(instructor_id).await?;
        self.store.lessons_for_instructor(instructor_id, None).await
    }

    pub async fn lessons_for_student(&self, student_id: Ulid) -> Result<Vec<Lesson>, EngineError> {
        self.require_student(student_id).await?;
        self.store.lessons_for_student(student_id).await
    }

    pub async fn get_request(&self, id: Ulid) -> Result<LessonRequest, EngineError> {
        self.require_request(id).await
    }

    pub async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<LessonRequest>, EngineError> {
        self.store.requests(status).await
    }
}
