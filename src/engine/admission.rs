use futures::future::try_join_all;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::MAX_PENDING_REQUESTS_PER_STUDENT;
use crate::model::*;
use crate::observability::{outcome, ADMISSIONS_TOTAL};

use super::availability::{fits_in, project_onto};
use super::conflict::{check_capacity, check_no_overlap, check_times};
use super::eligibility::{check_all, Participant};
use super::error::ValidationError;
use super::{Engine, EngineError};

impl Engine {
    /// Validate and store a confirmed lesson.
    pub async fn admit_lesson(&self, proposal: Proposal) -> Result<Lesson, EngineError> {
        let _guards = self.lock_instructors(&[proposal.instructor_id]).await?;
        let result = self.validate_lesson(&proposal, None).await;
        metrics::counter!(ADMISSIONS_TOTAL, "kind" => "lesson", "outcome" => outcome(&result)).increment(1);
        if let Err(e) = result {
            debug!("lesson rejected for instructor {}: {e}", proposal.instructor_id);
            return Err(e);
        }

        let lesson = proposal.into_lesson(Ulid::new());
        self.store.save_lesson(lesson.clone()).await?;
        info!(
            "lesson {} admitted for instructor {} [{}, {})",
            lesson.id, lesson.instructor_id, lesson.start_time, lesson.end_time
        );
        Ok(lesson)
    }

    /// Merge `patch` onto a stored lesson and re-admit the result.
    ///
    /// The lesson does not collide with its own previous placement.
    pub async fn update_lesson(&self, id: Ulid, patch: LessonPatch) -> Result<Lesson, EngineError> {
        let current = self.require_lesson(id).await?;
        let proposal = patch.merged_with(&current);
        let _guards = self
            .lock_instructors(&[current.instructor_id, proposal.instructor_id])
            .await?;

        let result = self.validate_lesson(&proposal, Some(id)).await;
        metrics::counter!(ADMISSIONS_TOTAL, "kind" => "lesson_update", "outcome" => outcome(&result)).increment(1);
        if let Err(e) = result {
            debug!("update of lesson {id} rejected: {e}");
            return Err(e);
        }

        let lesson = proposal.into_lesson(id);
        self.store.save_lesson(lesson.clone()).await?;
        info!("lesson {id} updated");
        Ok(lesson)
    }

    /// Direct-lesson admission. Checks run in order and the first failure wins.
    pub(super) async fn validate_lesson(
        &self,
        proposal: &Proposal,
        exclude: Option<Ulid>,
    ) -> Result<(), EngineError> {
        check_times(proposal.start_time, proposal.end_time, self.now())?;
        let instructor = self.check_participants(proposal).await?;
        check_capacity(proposal.lesson_type, &proposal.student_ids)?;

        let wanted = proposal.range();
        self.check_within_hours(&instructor, &wanted, exclude).await?;

        let existing = self
            .store
            .lessons_for_instructor(instructor.id, None)
            .await?;
        check_no_overlap(&wanted, existing.iter().map(|l| (l.id, l.range())), exclude)?;
        Ok(())
    }

    /// Validate and store a pending lesson request.
    ///
    /// Participant eligibility, overlap with the instructor's other requests and the
    /// students' pending quota are checked concurrently; whichever fails first is
    /// reported.
    pub async fn admit_request(&self, proposal: Proposal) -> Result<LessonRequest, EngineError> {
        let _guards = self.lock_instructors(&[proposal.instructor_id]).await?;
        let result = self.validate_request(&proposal).await;
        metrics::counter!(ADMISSIONS_TOTAL, "kind" => "request", "outcome" => outcome(&result)).increment(1);
        if let Err(e) = result {
            debug!("request rejected for instructor {}: {e}", proposal.instructor_id);
            return Err(e);
        }

        let request = proposal.into_request(Ulid::new(), self.now());
        self.store.insert_request(request.clone()).await?;
        info!(
            "request {} created for instructor {} [{}, {})",
            request.id, request.instructor_id, request.start_time, request.end_time
        );
        Ok(request)
    }

    async fn validate_request(&self, proposal: &Proposal) -> Result<(), EngineError> {
        check_times(proposal.start_time, proposal.end_time, self.now())?;
        check_capacity(proposal.lesson_type, &proposal.student_ids)?;

        let wanted = proposal.range();
        let participants = self.check_participants(proposal);
        let overlap = async {
            let existing = self
                .store
                .requests_for_instructor(proposal.instructor_id)
                .await?;
            check_no_overlap(&wanted, existing.iter().map(|r| (r.id, r.range())), None)?;
            Ok::<_, EngineError>(())
        };
        let quota = self.check_pending_quota(&proposal.student_ids);

        tokio::try_join!(participants, overlap, quota)?;
        Ok(())
    }

    /// Instructor must teach the style; every listed student must exist and accept it.
    pub(super) async fn check_participants(
        &self,
        proposal: &Proposal,
    ) -> Result<Instructor, EngineError> {
        let instructor = self.require_instructor(proposal.instructor_id).await?;
        instructor.check_eligible(proposal.style, proposal.lesson_type)?;

        if !proposal.student_ids.is_empty() {
            let students =
                try_join_all(proposal.student_ids.iter().map(|id| self.require_student(*id))).await?;
            check_all(&students, proposal.style, proposal.lesson_type)?;
            debug!(
                "{} students eligible for {} {} lesson with {}",
                students.len(),
                proposal.lesson_type,
                proposal.style,
                instructor.id()
            );
        }
        Ok(instructor)
    }

    /// `wanted` must fit inside one free slot of the instructor's day.
    pub(super) async fn check_within_hours(
        &self,
        instructor: &Instructor,
        wanted: &TimeRange,
        exclude: Option<Ulid>,
    ) -> Result<(), EngineError> {
        let date = wanted.start.date_naive();
        let outside = || ValidationError::OutsideAvailability {
            instructor: instructor.id,
            date,
            start: wanted.start,
            end: wanted.end,
        };
        let slot = project_onto(wanted, date).ok_or_else(outside)?;
        let free = self.free_hours(instructor, date, exclude).await?;
        if !fits_in(&free, &slot) {
            return Err(outside().into());
        }
        Ok(())
    }

    /// No student may already hold the maximum number of pending requests.
    async fn check_pending_quota(&self, student_ids: &[Ulid]) -> Result<(), EngineError> {
        let counts = try_join_all(
            student_ids
                .iter()
                .map(|id| self.store.pending_requests_for_student(*id)),
        )
        .await?;
        if let Some((student, pending)) = student_ids
            .iter()
            .zip(counts)
            .find(|(_, pending)| *pending >= MAX_PENDING_REQUESTS_PER_STUDENT)
        {
            return Err(ValidationError::PendingQuotaReached { student: *student, pending }.into());
        }
        Ok(())
    }
}
