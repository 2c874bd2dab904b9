use tracing::info;
use ulid::Ulid;

use crate::limits::MAX_NAME_LEN;
use crate::model::*;

use super::availability::validate_and_sort_availability;
use super::error::ValidationError;
use super::{Engine, EngineError, Entity};

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong);
    }
    Ok(())
}

impl Engine {
    pub async fn create_instructor(&self, draft: InstructorDraft) -> Result<Instructor, EngineError> {
        check_name(&draft.name)?;
        let instructor = Instructor {
            id: Ulid::new(),
            name: draft.name,
            expertise: draft.expertise,
            working_hours: validate_and_sort_availability(draft.working_hours)?,
        };
        self.store.save_instructor(instructor.clone()).await?;
        info!(
            "instructor {} created with {} working intervals",
            instructor.id,
            instructor.working_hours.len()
        );
        Ok(instructor)
    }

    /// Working hours in the patch replace the stored set wholesale, after validation.
    pub async fn update_instructor(
        &self,
        id: Ulid,
        patch: InstructorPatch,
    ) -> Result<Instructor, EngineError> {
        let mut instructor = self.require_instructor(id).await?;
        if let Some(name) = patch.name {
            check_name(&name)?;
            instructor.name = name;
        }
        if let Some(expertise) = patch.expertise {
            instructor.expertise = expertise;
        }
        if let Some(hours) = patch.working_hours {
            instructor.working_hours = validate_and_sort_availability(hours)?;
        }
        self.store.save_instructor(instructor.clone()).await?;
        info!("instructor {id} updated");
        Ok(instructor)
    }

    pub async fn delete_instructor(&self, id: Ulid) -> Result<(), EngineError> {
        let _guards = self.lock_instructors(&[id]).await?;
        if !self.store.delete_instructor(id).await? {
            return Err(EngineError::NotFound(Entity::Instructor, id));
        }
        self.admission_locks.remove(&id);
        info!("instructor {id} deleted");
        Ok(())
    }

    pub async fn create_student(&self, draft: StudentDraft) -> Result<Student, EngineError> {
        check_name(&draft.name)?;
        let student = Student {
            id: Ulid::new(),
            name: draft.name,
            preferred_styles: draft.preferred_styles,
            lesson_preference: draft.lesson_preference,
        };
        self.store.save_student(student.clone()).await?;
        info!("student {} created", student.id);
        Ok(student)
    }

    pub async fn update_student(&self, id: Ulid, patch: StudentPatch) -> Result<Student, EngineError> {
        let mut student = self.require_student(id).await?;
        if let Some(name) = patch.name {
            check_name(&name)?;
            student.name = name;
        }
        if let Some(styles) = patch.preferred_styles {
            student.preferred_styles = styles;
        }
        if let Some(pref) = patch.lesson_preference {
            student.lesson_preference = pref;
        }
        self.store.save_student(student.clone()).await?;
        info!("student {id} updated");
        Ok(student)
    }

    pub async fn delete_student(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.store.delete_student(id).await? {
            return Err(EngineError::NotFound(Entity::Student, id));
        }
        info!("student {id} deleted");
        Ok(())
    }

    pub async fn delete_lesson(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.store.delete_lesson(id).await? {
            return Err(EngineError::NotFound(Entity::Lesson, id));
        }
        info!("lesson {id} deleted");
        Ok(())
    }

    pub async fn delete_request(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.store.delete_request(id).await? {
            return Err(EngineError::NotFound(Entity::Request, id));
        }
        info!("request {id} deleted");
        Ok(())
    }
}
