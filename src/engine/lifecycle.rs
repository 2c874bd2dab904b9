use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;
use crate::observability::{outcome, REQUEST_DECISIONS_TOTAL};

use super::error::ConflictError;
use super::{Engine, EngineError};

/// What a decided request became.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved(Lesson),
    Rejected,
}

impl Engine {
    /// Move a pending request to approved or rejected.
    ///
    /// Rejection is unconditional. Approval first re-checks participants and the
    /// instructor's hours against current data; if that fails the request stays
    /// pending and the check's error is returned. On success the status flip and
    /// the new lesson are written as one repository call.
    pub async fn decide_request(&self, id: Ulid, approve: bool) -> Result<Decision, EngineError> {
        let instructor_id = self.require_request(id).await?.instructor_id;
        let _guards = self.lock_instructors(&[instructor_id]).await?;
        // Re-read under the lock; another decision may have landed meanwhile.
        let request = self.require_request(id).await?;

        let result = self.transition(&request, approve).await;
        let decision = if approve { "approve" } else { "reject" };
        metrics::counter!(REQUEST_DECISIONS_TOTAL, "decision" => decision, "outcome" => outcome(&result))
            .increment(1);
        result
    }

    async fn transition(&self, request: &LessonRequest, approve: bool) -> Result<Decision, EngineError> {
        if !request.is_pending() {
            return Err(ConflictError::NotPending { request: request.id, status: request.status }.into());
        }

        if !approve {
            self.store
                .set_request_status(request.id, RequestStatus::Rejected)
                .await?;
            info!("request {} rejected", request.id);
            return Ok(Decision::Rejected);
        }

        if let Err(e) = self.validate_approval(request).await {
            debug!("request {} not approvable: {e}", request.id);
            return Err(e);
        }
        let lesson = request.to_lesson(Ulid::new());
        self.store.approve_request(request.id, lesson.clone()).await?;
        info!("request {} approved as lesson {}", request.id, lesson.id);
        Ok(Decision::Approved(lesson))
    }

    /// Would approving this request succeed right now?
    ///
    /// Read-only. Errors are the same ones `decide_request(id, true)` would return.
    pub async fn revalidate_request(&self, id: Ulid) -> Result<(), EngineError> {
        let request = self.require_request(id).await?;
        if !request.is_pending() {
            return Err(ConflictError::NotPending { request: id, status: request.status }.into());
        }
        self.validate_approval(&request).await
    }

    async fn validate_approval(&self, request: &LessonRequest) -> Result<(), EngineError> {
        let instructor = self.check_participants(&request.proposal()).await?;
        self.check_within_hours(&instructor, &request.range(), None).await
    }
}
