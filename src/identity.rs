use crate::error::{GradebookError, Result};
use crate::models::{normalize_key, Enrollee, TeacherIdentity};
use crate::table::GradeTable;

/// Exact match on name (ignoring case) and registration (ignoring surrounding space).
pub fn validate_student(name: &str, registration_id: &str, enrollees: &[Enrollee]) -> bool {
    let name = name.trim().to_uppercase();
    let registration_id = registration_id.trim();
    enrollees.iter().any(|e| {
        e.name.trim().to_uppercase() == name && e.registration_id.trim() == registration_id
    })
}

pub fn validate_teacher(registration_id: &str, table: &GradeTable) -> bool {
    let registration_id = normalize_key(registration_id);
    !registration_id.is_empty()
        && table
            .records()
            .iter()
            .any(|r| r.teacher_registration_id == registration_id)
}

pub fn authenticate_teacher(
    name: &str,
    registration_id: &str,
    table: &GradeTable,
) -> Result<TeacherIdentity> {
    if name.trim().is_empty() || registration_id.trim().is_empty() {
        return Err(GradebookError::InvalidInput(
            "teacher name and registration are both required".to_string(),
        ));
    }
    if !validate_teacher(registration_id, table) {
        return Err(GradebookError::NotFound(
            "invalid registration or no grading permission".to_string(),
        ));
    }
    Ok(TeacherIdentity {
        name: name.trim().to_string(),
        registration_id: normalize_key(registration_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::columns;
    use crate::table::fixtures::{grade_snapshot, sample_rows};

    fn enrollee(name: &str, registration_id: &str) -> Enrollee {
        Enrollee {
            name: name.to_string(),
            registration_id: registration_id.to_string(),
            shift: String::new(),
        }
    }

    #[test]
    fn student_match_ignores_case_and_padding() {
        let enrollees = vec![enrollee("Ana Silva", "123"), enrollee("Bruno Costa", "456")];
        assert!(validate_student("ANA SILVA", " 123 ", &enrollees));
        assert!(!validate_student("Ana Silva", "456", &enrollees));
        assert!(!validate_student("Ana", "123", &enrollees));
        assert!(!validate_student("Ana Silva", "12", &enrollees));
    }

    #[test]
    fn teacher_authentication() {
        let table = GradeTable::from_snapshot(&grade_snapshot(&sample_rows()), &columns::ENTRY)
            .expect("table");
        let teacher = authenticate_teacher("Carla Souza", " p01 ", &table).expect("auth");
        assert_eq!(teacher.registration_id, "P01");

        assert!(matches!(
            authenticate_teacher("Carla Souza", "P77", &table),
            Err(GradebookError::NotFound(_))
        ));
        assert!(matches!(
            authenticate_teacher("", "P01", &table),
            Err(GradebookError::InvalidInput(_))
        ));
        assert!(!validate_teacher("   ", &table));
    }
}
