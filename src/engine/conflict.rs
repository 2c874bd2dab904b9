use std::collections::HashSet;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::model::*;

use super::error::ValidationError;

/// Start strictly after `now`, end strictly after start.
pub(crate) fn check_times(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if start <= now {
        return Err(ValidationError::StartNotInFuture { start });
    }
    if end <= start {
        return Err(ValidationError::EndNotAfterStart { start, end });
    }
    Ok(())
}

/// Student ids must be unique and fit the lesson type's cap.
pub(crate) fn check_capacity(
    lesson_type: LessonType,
    student_ids: &[Ulid],
) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(student_ids.len());
    if let Some(dup) = student_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(ValidationError::DuplicateStudent { student: *dup });
    }
    let cap = lesson_type.capacity();
    if student_ids.len() > cap {
        return Err(ValidationError::CapacityExceeded {
            lesson_type,
            count: student_ids.len(),
            cap,
        });
    }
    Ok(())
}

/// Reject `wanted` if it overlaps any existing booking other than `exclude`.
///
/// One half-open test covers partial overlap, identical bounds and containment in
/// either direction; touching ranges pass.
pub(crate) fn check_no_overlap(
    wanted: &TimeRange,
    existing: impl IntoIterator<Item = (Ulid, TimeRange)>,
    exclude: Option<Ulid>,
) -> Result<(), ValidationError> {
    for (id, range) in existing {
        if Some(id) == exclude {
            continue;
        }
        if range.overlaps(wanted) {
            return Err(ValidationError::Overlaps { existing: id });
        }
    }
    Ok(())
}
