use chrono::NaiveDate;
use serde::Deserialize;
use ulid::Ulid;

use crate::model::*;

/// One host command, as a JSON object tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateInstructor {
        instructor: InstructorDraft,
    },
    UpdateInstructor {
        id: Ulid,
        patch: InstructorPatch,
    },
    DeleteInstructor {
        id: Ulid,
    },
    GetInstructor {
        id: Ulid,
    },
    ListInstructors,
    CreateStudent {
        student: StudentDraft,
    },
    UpdateStudent {
        id: Ulid,
        patch: StudentPatch,
    },
    DeleteStudent {
        id: Ulid,
    },
    GetStudent {
        id: Ulid,
    },
    /// Validate and normalize working hours without storing anything.
    ValidateAvailability {
        working_hours: Vec<WorkingInterval>,
    },
    /// Pure slot computation over caller-supplied hours and busy slots.
    FreeSlots {
        day: Day,
        working_hours: Vec<WorkingInterval>,
        #[serde(default)]
        busy: Vec<Slot>,
    },
    AvailableHours {
        instructor_id: Ulid,
        date: NaiveDate,
    },
    WeeklyAvailability {
        date: NaiveDate,
        #[serde(default)]
        instructor_ids: Option<Vec<Ulid>>,
        #[serde(default)]
        styles: Vec<Style>,
    },
    AdmitLesson {
        lesson: Proposal,
    },
    UpdateLesson {
        id: Ulid,
        patch: LessonPatch,
    },
    DeleteLesson {
        id: Ulid,
    },
    GetLesson {
        id: Ulid,
    },
    LessonsForInstructor {
        instructor_id: Ulid,
    },
    LessonsForStudent {
        student_id: Ulid,
    },
    AdmitRequest {
        request: Proposal,
    },
    DecideRequest {
        id: Ulid,
        approve: bool,
    },
    DeleteRequest {
        id: Ulid,
    },
    GetRequest {
        id: Ulid,
    },
    ListRequests {
        #[serde(default)]
        status: Option<RequestStatus>,
    },
}

impl Command {
    /// Metric label for this command.
    pub fn label(&self) -> &'static str {
        match self {
            Command::CreateInstructor { .. } => "create_instructor",
            Command::UpdateInstructor { .. } => "update_instructor",
            Command::DeleteInstructor { .. } => "delete_instructor",
            Command::GetInstructor { .. } => "get_instructor",
            Command::ListInstructors => "list_instructors",
            Command::CreateStudent { .. } => "create_student",
            Command::UpdateStudent { .. } => "update_student",
            Command::DeleteStudent { .. } => "delete_student",
            Command::GetStudent { .. } => "get_student",
            Command::ValidateAvailability { .. } => "validate_availability",
            Command::FreeSlots { .. } => "free_slots",
            Command::AvailableHours { .. } => "available_hours",
            Command::WeeklyAvailability { .. } => "weekly_availability",
            Command::AdmitLesson { .. } => "admit_lesson",
            Command::UpdateLesson { .. } => "update_lesson",
            Command::DeleteLesson { .. } => "delete_lesson",
            Command::GetLesson { .. } => "get_lesson",
            Command::LessonsForInstructor { .. } => "lessons_for_instructor",
            Command::LessonsForStudent { .. } => "lessons_for_student",
            Command::AdmitRequest { .. } => "admit_request",
            Command::DecideRequest { .. } => "decide_request",
            Command::DeleteRequest { .. } => "delete_request",
            Command::GetRequest { .. } => "get_request",
            Command::ListRequests { .. } => "list_requests",
        }
    }
}

/// Parse one JSON command.
pub fn parse_command(input: &str) -> Result<Command, serde_json::Error> {
    serde_json::from_str(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    #[test]
    fn parse_unit_command() {
        let cmd = parse_command(r#"{"op":"list_instructors"}"#).unwrap();
        assert_eq!(cmd, Command::ListInstructors);
        assert_eq!(cmd.label(), "list_instructors");
    }

    #[test]
    fn parse_create_instructor_with_hours() {
        let cmd = parse_command(
            r#"{"op":"create_instructor","instructor":{"name":"Mia",
                "expertise":["freestyle","butterfly"],
                "working_hours":[{"day":"monday","start":"09:00","end":"12:00"}]}}"#,
        )
        .unwrap();
        match cmd {
            Command::CreateInstructor { instructor } => {
                assert_eq!(instructor.name, "Mia");
                assert_eq!(instructor.expertise.len(), 2);
                assert_eq!(instructor.working_hours[0].day, Day::Monday);
                assert_eq!(instructor.working_hours[0].end.to_string(), "12:00");
            }
            _ => panic!("expected CreateInstructor, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_weekly_defaults() {
        let cmd = parse_command(r#"{"op":"weekly_availability","date":"2030-01-07"}"#).unwrap();
        match cmd {
            Command::WeeklyAvailability { date, instructor_ids, styles } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2030, 1, 7).unwrap());
                assert_eq!(instructor_ids, None);
                assert!(styles.is_empty());
            }
            _ => panic!("expected WeeklyAvailability, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_admit_lesson() {
        let input = format!(
            r#"{{"op":"admit_lesson","lesson":{{"instructor_id":"{ID}","student_ids":["{ID}"],
                "style":"backstroke","lesson_type":"private",
                "start_time":"2030-01-07T10:00:00Z","end_time":"2030-01-07T11:00:00Z"}}}}"#
        );
        match parse_command(&input).unwrap() {
            Command::AdmitLesson { lesson } => {
                assert_eq!(lesson.instructor_id.to_string(), ID);
                assert_eq!(lesson.style, Style::Backstroke);
                assert_eq!(lesson.lesson_type, LessonType::Private);
                assert_eq!(lesson.range().end - lesson.range().start, chrono::Duration::hours(1));
            }
            other => panic!("expected AdmitLesson, got {other:?}"),
        }
    }

    #[test]
    fn parse_decide_and_filter() {
        let decide = parse_command(&format!(r#"{{"op":"decide_request","id":"{ID}","approve":false}}"#)).unwrap();
        assert!(matches!(decide, Command::DecideRequest { approve: false, .. }));
        let list = parse_command(r#"{"op":"list_requests","status":"pending"}"#).unwrap();
        assert_eq!(list, Command::ListRequests { status: Some(RequestStatus::Pending) });
    }

    #[test]
    fn reject_bad_input() {
        assert!(parse_command(r#"{"op":"drop_everything"}"#).is_err());
        assert!(parse_command(r#"{"op":"get_lesson","id":"nope"}"#).is_err());
        assert!(parse_command(
            r#"{"op":"free_slots","day":"monday","working_hours":[{"day":"monday","start":"9:00","end":"12:00"}]}"#
        )
        .is_err());
        assert!(parse_command("not json").is_err());
    }
}
