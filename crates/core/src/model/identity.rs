use crate::model::ids::StudentId;

/// Role tag supplied by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
    Other,
}

/// Who is looking at the quiz.
///
/// Teachers get a read-only preview with every correct answer shown and
/// never create or score attempts; anyone without a student identity
/// cannot attempt either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    student: Option<StudentId>,
    role: Role,
}

impl Viewer {
    #[must_use]
    pub fn new(student: Option<StudentId>, role: Role) -> Self {
        Self { student, role }
    }

    #[must_use]
    pub fn student(id: StudentId) -> Self {
        Self::new(Some(id), Role::Student)
    }

    #[must_use]
    pub fn teacher() -> Self {
        Self::new(None, Role::Teacher)
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(None, Role::Other)
    }

    #[must_use]
    pub fn student_id(&self) -> Option<StudentId> {
        self.student
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// True when this viewer may start and submit attempts.
    #[must_use]
    pub fn can_attempt(&self) -> bool {
        self.role == Role::Student && self.student.is_some()
    }

    /// True when this viewer sees the read-only all-answers preview.
    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.role == Role::Teacher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn student_with_identity_can_attempt() {
        let viewer = Viewer::student(StudentId::new(Uuid::from_u128(1)));
        assert!(viewer.can_attempt());
        assert!(!viewer.is_preview());
    }

    #[test]
    fn teacher_previews_and_never_attempts() {
        let viewer = Viewer::teacher();
        assert!(viewer.is_preview());
        assert!(!viewer.can_attempt());
    }

    #[test]
    fn student_role_without_identity_cannot_attempt() {
        let viewer = Viewer::new(None, Role::Student);
        assert!(!viewer.can_attempt());
    }
}
