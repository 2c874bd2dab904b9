use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use ulid::Ulid;

use crate::model::{ClockTime, Day, LessonType, RequestStatus, Slot, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Instructor,
    Student,
    Lesson,
    Request,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Instructor => f.write_str("instructor"),
            Entity::Student => f.write_str("student"),
            Entity::Lesson => f.write_str("lesson"),
            Entity::Request => f.write_str("lesson request"),
        }
    }
}

/// Malformed input or a violated business rule. Always recoverable by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidRange {
        day: Day,
        start: ClockTime,
        end: ClockTime,
    },
    OverlappingRanges {
        day: Day,
        first: Slot,
        second: Slot,
    },
    TooManyIntervals(usize),
    NameTooLong,
    StartNotInFuture {
        start: DateTime<Utc>,
    },
    EndNotAfterStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    InstructorLacksExpertise {
        instructor: Ulid,
        style: Style,
    },
    StyleNotPreferred {
        student: Ulid,
        style: Style,
    },
    LessonTypeNotPreferred {
        student: Ulid,
        lesson_type: LessonType,
    },
    DuplicateStudent {
        student: Ulid,
    },
    CapacityExceeded {
        lesson_type: LessonType,
        count: usize,
        cap: usize,
    },
    OutsideAvailability {
        instructor: Ulid,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Overlaps {
        existing: Ulid,
    },
    PendingQuotaReached {
        student: Ulid,
        pending: usize,
    },
    NotFutureWeek {
        date: NaiveDate,
    },
    DateOutOfRange {
        date: NaiveDate,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidRange { day, start, end } => {
                write!(f, "invalid range on {day}: {start} is not before {end}")
            }
            ValidationError::OverlappingRanges { day, first, second } => {
                write!(f, "overlapping ranges on {day}: {first} and {second}")
            }
            ValidationError::TooManyIntervals(n) => {
                write!(f, "too many working intervals: {n}")
            }
            ValidationError::NameTooLong => f.write_str("name too long"),
            ValidationError::StartNotInFuture { start } => {
                write!(f, "start time {start} must be in the future")
            }
            ValidationError::EndNotAfterStart { start, end } => {
                write!(f, "end time {end} must be after start time {start}")
            }
            ValidationError::InstructorLacksExpertise { instructor, style } => {
                write!(f, "instructor {instructor} does not teach {style}")
            }
            ValidationError::StyleNotPreferred { student, style } => {
                write!(f, "student {student} does not prefer {style}")
            }
            ValidationError::LessonTypeNotPreferred { student, lesson_type } => {
                write!(f, "student {student} does not accept {lesson_type} lessons")
            }
            ValidationError::DuplicateStudent { student } => {
                write!(f, "student {student} listed more than once")
            }
            ValidationError::CapacityExceeded { lesson_type, count, cap } => {
                write!(f, "{lesson_type} lesson allows at most {cap} students, got {count}")
            }
            ValidationError::OutsideAvailability { instructor, date, start, end } => {
                write!(
                    f,
                    "instructor {instructor} is not available on {date} for [{start}, {end})"
                )
            }
            ValidationError::Overlaps { existing } => {
                write!(f, "time range overlaps existing booking {existing}")
            }
            ValidationError::PendingQuotaReached { student, pending } => {
                write!(f, "student {student} already has {pending} pending requests")
            }
            ValidationError::NotFutureWeek { date } => {
                write!(f, "date {date} must be in a future week")
            }
            ValidationError::DateOutOfRange { date } => {
                write!(f, "date {date} is outside the supported calendar")
            }
        }
    }
}

/// State-machine violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    NotPending { request: Ulid, status: RequestStatus },
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictError::NotPending { request, status } => write!(
                f,
                "only pending requests can be transitioned; request {request} is {status}"
            ),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationError),
    NotFound(Entity, Ulid),
    Conflict(ConflictError),
    Storage(String),
}

impl EngineError {
    /// Short machine-readable category for hosts and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::NotFound(..) => "not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::Storage(_) => "internal",
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl From<ConflictError> for EngineError {
    fn from(e: ConflictError) -> Self {
        EngineError::Conflict(e)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "validation failed: {e}"),
            EngineError::NotFound(entity, id) => write!(f, "{entity} not found: {id}"),
            EngineError::Conflict(e) => write!(f, "conflict: {e}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
