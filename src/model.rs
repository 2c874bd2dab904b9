use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::*;

// ── Time primitives ──────────────────────────────────────────────

/// Day of week, Sunday first. Ordering follows the declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        Self::ALL[date.weekday().num_days_from_sunday() as usize]
    }

    /// Days elapsed since the Sunday that opens the week.
    pub fn offset(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Day::Sunday => "Sunday",
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        };
        f.write_str(name)
    }
}

/// Wall-clock time of day with minute precision, rendered as zero-padded `HH:mm`.
///
/// `24:00` is representable and denotes the end of the day, so a range may close
/// exactly at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);
    pub const END_OF_DAY: ClockTime = ClockTime(24 * 60);

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if minute >= 60 || hour > 24 || (hour == 24 && minute != 0) {
            return None;
        }
        Some(ClockTime((hour * 60 + minute) as u16))
    }

    /// Seconds and below are truncated.
    pub fn from_time(time: NaiveTime) -> Self {
        ClockTime((time.hour() * 60 + time.minute()) as u16)
    }

    /// Rounds up to the next whole minute when seconds or below are present.
    /// `23:59:30` becomes `24:00`.
    pub fn from_time_ceil(time: NaiveTime) -> Self {
        let floor = Self::from_time(time);
        if time.second() == 0 && time.nanosecond() == 0 {
            floor
        } else {
            ClockTime(floor.0 + 1)
        }
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0 % 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockTimeParseError(pub String);

impl fmt::Display for ClockTimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid clock time {:?}: expected zero-padded HH:mm", self.0)
    }
}

impl std::error::Error for ClockTimeParseError {}

impl std::str::FromStr for ClockTime {
    type Err = ClockTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClockTimeParseError(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(err());
        }
        let digits = |pair: &[u8]| -> Option<u32> {
            if pair.iter().all(u8::is_ascii_digit) {
                Some(u32::from(pair[0] - b'0') * 10 + u32::from(pair[1] - b'0'))
            } else {
                None
            }
        };
        let hour = digits(&bytes[..2]).ok_or_else(err)?;
        let minute = digits(&bytes[3..]).ok_or_else(err)?;
        ClockTime::from_hm(hour, minute).ok_or_else(err)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ClockTimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span<T> {
    pub start: T,
    pub end: T,
}

/// A same-day range of clock times.
pub type Slot = Span<ClockTime>;

/// An absolute range of instants.
pub type TimeRange = Span<DateTime<Utc>>;

impl<T: Ord + Copy + fmt::Debug> Span<T> {
    pub fn new(start: T, end: T) -> Self {
        debug_assert!(start < end, "Span start must be before end: {start:?} >= {end:?}");
        Self { start, end }
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Span<T>) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains(&self, other: &Span<T>) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A declared recurring weekly block during which an instructor works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkingInterval {
    pub day: Day,
    pub start: ClockTime,
    pub end: ClockTime,
}

impl WorkingInterval {
    pub fn new(day: Day, start: ClockTime, end: ClockTime) -> Self {
        Self { day, start, end }
    }

    /// `None` for a malformed interval (start at or after end).
    pub fn slot(&self) -> Option<Slot> {
        (self.start < self.end).then(|| Slot::new(self.start, self.end))
    }
}

// ── Lesson vocabulary ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Freestyle,
    Backstroke,
    Breaststroke,
    Butterfly,
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Style::Freestyle => "freestyle",
            Style::Backstroke => "backstroke",
            Style::Breaststroke => "breaststroke",
            Style::Butterfly => "butterfly",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Private,
    Group,
}

impl LessonType {
    /// Maximum number of students on one lesson of this type.
    pub fn capacity(self) -> usize {
        match self {
            LessonType::Private => PRIVATE_LESSON_CAPACITY,
            LessonType::Group => GROUP_LESSON_CAPACITY,
        }
    }
}

impl fmt::Display for LessonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonType::Private => f.write_str("private"),
            LessonType::Group => f.write_str("group"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonPreference {
    Private,
    Group,
    BothPreferPrivate,
    BothPreferGroup,
}

impl LessonPreference {
    pub fn allows(self, lesson_type: LessonType) -> bool {
        match lesson_type {
            LessonType::Private => {
                matches!(self, LessonPreference::Private | LessonPreference::BothPreferPrivate)
            }
            LessonType::Group => {
                matches!(self, LessonPreference::Group | LessonPreference::BothPreferGroup)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => f.write_str("pending"),
            RequestStatus::Approved => f.write_str("approved"),
            RequestStatus::Rejected => f.write_str("rejected"),
        }
    }
}

// ── Entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: Ulid,
    pub name: String,
    pub expertise: BTreeSet<Style>,
    /// Sorted by `(day, start)`; replaced wholesale on every save.
    pub working_hours: Vec<WorkingInterval>,
}

impl Instructor {
    /// Working blocks declared for `day`, in start order.
    pub fn hours_on(&self, day: Day) -> impl Iterator<Item = &WorkingInterval> {
        self.working_hours.iter().filter(move |w| w.day == day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Ulid,
    pub name: String,
    pub preferred_styles: BTreeSet<Style>,
    pub lesson_preference: LessonPreference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Ulid,
    pub instructor_id: Ulid,
    pub student_ids: Vec<Ulid>,
    pub style: Style,
    pub lesson_type: LessonType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Lesson {
    pub fn range(&self) -> TimeRange {
        TimeRange { start: self.start_time, end: self.end_time }
    }

    pub fn has_student(&self, student_id: &Ulid) -> bool {
        self.student_ids.contains(student_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRequest {
    pub id: Ulid,
    pub instructor_id: Ulid,
    pub student_ids: Vec<Ulid>,
    pub style: Style,
    pub lesson_type: LessonType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl LessonRequest {
    pub fn range(&self) -> TimeRange {
        TimeRange { start: self.start_time, end: self.end_time }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn proposal(&self) -> Proposal {
        Proposal {
            instructor_id: self.instructor_id,
            student_ids: self.student_ids.clone(),
            style: self.style,
            lesson_type: self.lesson_type,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// The confirmed lesson this request turns into on approval.
    pub fn to_lesson(&self, lesson_id: Ulid) -> Lesson {
        Lesson {
            id: lesson_id,
            instructor_id: self.instructor_id,
            student_ids: self.student_ids.clone(),
            style: self.style,
            lesson_type: self.lesson_type,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// A lesson or lesson request as submitted, before admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub instructor_id: Ulid,
    #[serde(default)]
    pub student_ids: Vec<Ulid>,
    pub style: Style,
    pub lesson_type: LessonType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Proposal {
    pub fn range(&self) -> TimeRange {
        TimeRange { start: self.start_time, end: self.end_time }
    }

    pub fn into_lesson(self, id: Ulid) -> Lesson {
        Lesson {
            id,
            instructor_id: self.instructor_id,
            student_ids: self.student_ids,
            style: self.style,
            lesson_type: self.lesson_type,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    pub fn into_request(self, id: Ulid, created_at: DateTime<Utc>) -> LessonRequest {
        LessonRequest {
            id,
            instructor_id: self.instructor_id,
            student_ids: self.student_ids,
            style: self.style,
            lesson_type: self.lesson_type,
            start_time: self.start_time,
            end_time: self.end_time,
            status: RequestStatus::Pending,
            created_at,
        }
    }
}

/// Partial lesson update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPatch {
    #[serde(default)]
    pub instructor_id: Option<Ulid>,
    #[serde(default)]
    pub student_ids: Option<Vec<Ulid>>,
    #[serde(default)]
    pub style: Option<Style>,
    #[serde(default)]
    pub lesson_type: Option<LessonType>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl LessonPatch {
    /// Merge onto `lesson`, yielding the proposal to re-admit.
    pub fn merged_with(&self, lesson: &Lesson) -> Proposal {
        Proposal {
            instructor_id: self.instructor_id.unwrap_or(lesson.instructor_id),
            student_ids: self
                .student_ids
                .clone()
                .unwrap_or_else(|| lesson.student_ids.clone()),
            style: self.style.unwrap_or(lesson.style),
            lesson_type: self.lesson_type.unwrap_or(lesson.lesson_type),
            start_time: self.start_time.unwrap_or(lesson.start_time),
            end_time: self.end_time.unwrap_or(lesson.end_time),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorDraft {
    pub name: String,
    #[serde(default)]
    pub expertise: BTreeSet<Style>,
    #[serde(default)]
    pub working_hours: Vec<WorkingInterval>,
}

/// Working hours, when present, replace the stored set wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expertise: Option<BTreeSet<Style>>,
    #[serde(default)]
    pub working_hours: Option<Vec<WorkingInterval>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDraft {
    pub name: String,
    #[serde(default)]
    pub preferred_styles: BTreeSet<Style>,
    pub lesson_preference: LessonPreference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_styles: Option<BTreeSet<Style>>,
    #[serde(default)]
    pub lesson_preference: Option<LessonPreference>,
}

/// Journal record. One record per committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    InstructorSaved { instructor: Instructor },
    InstructorDeleted { id: Ulid },
    StudentSaved { student: Student },
    StudentDeleted { id: Ulid },
    LessonSaved { lesson: Lesson },
    LessonDeleted { id: Ulid },
    RequestCreated { request: LessonRequest },
    RequestStatusChanged { id: Ulid, status: RequestStatus },
    /// Status flip and lesson materialization in one record.
    RequestApproved { id: Ulid, lesson: Lesson },
    RequestDeleted { id: Ulid },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayAvailability {
    pub day: Day,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructorWeek {
    pub instructor_id: Ulid,
    pub name: String,
    pub days: Vec<DayAvailability>,
}
