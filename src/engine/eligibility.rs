use ulid::Ulid;

use crate::model::*;

use super::error::ValidationError;

/// Someone taking part in a lesson, instructor or student.
pub trait Participant {
    fn id(&self) -> Ulid;

    /// Ok if this participant can take part in a `style` lesson of `lesson_type`.
    fn check_eligible(&self, style: Style, lesson_type: LessonType) -> Result<(), ValidationError>;
}

impl Participant for Instructor {
    fn id(&self) -> Ulid {
        self.id
    }

    /// Instructors teach any lesson type in a style they are expert in.
    fn check_eligible(&self, style: Style, _lesson_type: LessonType) -> Result<(), ValidationError> {
        if !self.expertise.contains(&style) {
            return Err(ValidationError::InstructorLacksExpertise { instructor: self.id, style });
        }
        Ok(())
    }
}

impl Participant for Student {
    fn id(&self) -> Ulid {
        self.id
    }

    fn check_eligible(&self, style: Style, lesson_type: LessonType) -> Result<(), ValidationError> {
        if !self.preferred_styles.contains(&style) {
            return Err(ValidationError::StyleNotPreferred { student: self.id, style });
        }
        if !self.lesson_preference.allows(lesson_type) {
            return Err(ValidationError::LessonTypeNotPreferred { student: self.id, lesson_type });
        }
        Ok(())
    }
}

/// First ineligible participant wins.
pub fn check_all<P: Participant>(
    participants: &[P],
    style: Style,
    lesson_type: LessonType,
) -> Result<(), ValidationError> {
    participants
        .iter()
        .try_for_each(|p| p.check_eligible(style, lesson_type))
}
