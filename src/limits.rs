/// Students allowed on a private lesson.
pub const PRIVATE_LESSON_CAPACITY: usize = 1;

/// Students allowed on a group lesson.
pub const GROUP_LESSON_CAPACITY: usize = 30;

/// Pending requests a single student may hold at once.
pub const MAX_PENDING_REQUESTS_PER_STUDENT: usize = 2;

/// Working intervals one instructor may declare, at most one per hour of the week.
pub const MAX_WORKING_INTERVALS: usize = 7 * 24;

/// Longest instructor or student name, in bytes.
pub const MAX_NAME_LEN: usize = 256;
