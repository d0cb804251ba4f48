use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::error::Result;
use crate::models::{normalize_key, Enrollee, EvaluationType, GradeKey, GradeRecord};
use crate::normalize::normalize_grade;
use crate::schema::{columns, SheetSchema};
use crate::sheet::SheetSnapshot;

#[derive(Debug, Clone)]
pub struct GradeTable {
    schema: SheetSchema,
    records: Vec<GradeRecord>,
}

impl GradeTable {
    pub fn from_snapshot(snapshot: &SheetSnapshot, required: &[&str]) -> Result<Self> {
        let schema = SheetSchema::bind(&snapshot.sheet, &snapshot.headers, required)?;

        let text = |cells: &[String], column: &str| -> String {
            schema.cell(cells, column).unwrap_or("").trim().to_string()
        };
        let key = |cells: &[String], column: &str| -> String {
            normalize_key(schema.cell(cells, column).unwrap_or(""))
        };

        let records: Vec<GradeRecord> = snapshot
            .rows
            .iter()
            .filter(|row| row.cells.iter().any(|c| !c.trim().is_empty()))
            .map(|row| GradeRecord {
                student_name: text(&row.cells, columns::STUDENT_NAME),
                registration_id: key(&row.cells, columns::REGISTRATION),
                class_label: key(&row.cells, columns::CLASS),
                shift: text(&row.cells, columns::SHIFT),
                subject: key(&row.cells, columns::SUBJECT),
                period: key(&row.cells, columns::PERIOD),
                evaluation_type: evaluation_label(key(&row.cells, columns::EVALUATION)),
                score: normalize_grade(schema.cell(&row.cells, columns::SCORE)),
                teacher_name: text(&row.cells, columns::TEACHER_NAME),
                teacher_registration_id: key(&row.cells, columns::TEACHER_REGISTRATION),
                row_index: row.row_index,
            })
            .collect();

        debug!(
            sheet = %snapshot.sheet,
            rows = records.len(),
            "parsed grade sheet"
        );

        Ok(Self { schema, records })
    }

    pub fn schema(&self) -> &SheetSchema {
        &self.schema
    }

    pub fn records(&self) -> &[GradeRecord] {
        &self.records
    }

    pub fn classes(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| !r.class_label.is_empty())
            .map(|r| r.class_label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn students_in_class(&self, class_label: &str) -> Vec<Enrollee> {
        let class_label = normalize_key(class_label);
        let mut seen = HashSet::new();
        let mut enrollees: Vec<Enrollee> = self
            .records
            .iter()
            .filter(|r| r.class_label == class_label)
            .filter(|r| seen.insert((r.student_name.to_uppercase(), r.registration_id.clone())))
            .map(|r| Enrollee {
                name: r.student_name.clone(),
                registration_id: r.registration_id.clone(),
                shift: r.shift.clone(),
            })
            .collect();
        enrollees.sort_by(|a, b| a.name.to_uppercase().cmp(&b.name.to_uppercase()));
        enrollees
    }

    pub fn periods_for_student(&self, class_label: &str, student_name: &str) -> Vec<String> {
        let class_label = normalize_key(class_label);
        let student_name = student_name.trim().to_uppercase();
        self.records
            .iter()
            .filter(|r| {
                r.class_label == class_label && r.student_name.to_uppercase() == student_name
            })
            .filter(|r| !r.period.is_empty())
            .map(|r| r.period.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn student_rows(
        &self,
        student_name: &str,
        registration_id: &str,
        class_label: &str,
        period: &str,
    ) -> Vec<&GradeRecord> {
        let student_name = student_name.trim().to_uppercase();
        let registration_id = registration_id.trim();
        let class_label = normalize_key(class_label);
        let period = normalize_key(period);
        self.records
            .iter()
            .filter(|r| {
                r.student_name.to_uppercase() == student_name
                    && r.registration_id == registration_id
                    && r.class_label == class_label
                    && r.period == period
            })
            .collect()
    }

    /// First row in sheet order carrying `key`.
    pub fn find(&self, key: &GradeKey) -> Option<&GradeRecord> {
        self.records.iter().find(|r| {
            r.registration_id == key.registration_id
                && r.class_label == key.class_label
                && r.subject == key.subject
                && r.period == key.period
                && r.evaluation_type == key.evaluation_type
        })
    }

    pub fn teacher_classes(&self, teacher_registration: &str) -> Vec<String> {
        let teacher_registration = normalize_key(teacher_registration);
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| r.teacher_registration_id == teacher_registration)
            .filter(|r| seen.insert(r.class_label.clone()))
            .map(|r| r.class_label.clone())
            .collect()
    }

    pub fn teacher_subjects(&self, teacher_registration: &str, class_label: &str) -> Vec<String> {
        let teacher_registration = normalize_key(teacher_registration);
        let class_label = normalize_key(class_label);
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| {
                r.teacher_registration_id == teacher_registration && r.class_label == class_label
            })
            .filter(|r| seen.insert(r.subject.clone()))
            .map(|r| r.subject.clone())
            .collect()
    }

    pub fn roster(&self, class_label: &str) -> Vec<Enrollee> {
        let class_label = normalize_key(class_label);
        let mut seen = HashSet::new();
        let mut roster: Vec<Enrollee> = self
            .records
            .iter()
            .filter(|r| r.class_label == class_label)
            .filter(|r| seen.insert(r.registration_id.clone()))
            .map(|r| Enrollee {
                name: r.student_name.clone(),
                registration_id: r.registration_id.clone(),
                shift: r.shift.clone(),
            })
            .collect();
        roster.sort_by(|a, b| a.name.cmp(&b.name));
        roster
    }
}

// Unaccented spellings collapse onto the stored label so key lookups see them.
fn evaluation_label(raw: String) -> String {
    match raw.parse::<EvaluationType>() {
        Ok(kind) => kind.label().to_string(),
        Err(_) => raw,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{grade_snapshot, sample_rows};
    use super::*;

    fn table() -> GradeTable {
        GradeTable::from_snapshot(&grade_snapshot(&sample_rows()), &columns::ENTRY).expect("table")
    }

    #[test]
    fn parses_rows_with_normalized_keys_and_scores() {
        let table = table();
        let first = &table.records()[0];
        assert_eq!(first.student_name, "Ana Silva");
        assert_eq!(first.subject, "MATEMÁTICA");
        assert_eq!(first.score, 5.0);
        assert_eq!(first.row_index, 2);
        assert_eq!(table.records()[3].score, 8.5);
    }

    #[test]
    fn lists_classes_students_and_periods() {
        let table = table();
        assert_eq!(table.classes(), vec!["5A", "6B"]);
        let students = table.students_in_class("5a");
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].name, "Ana Silva");
        assert_eq!(students[1].registration_id, "456");
        assert_eq!(table.periods_for_student("5A", "ANA SILVA"), vec!["1º", "2º"]);
    }

    #[test]
    fn filters_student_rows_by_class_and_period() {
        let table = table();
        let rows = table.student_rows("ana silva", " 123 ", "5A", "1º");
        assert_eq!(rows.len(), 3);
        assert!(table.student_rows("Ana Silva", "999", "5A", "1º").is_empty());
    }

    #[test]
    fn finds_by_composite_key() {
        let table = table();
        let key = GradeKey::new("123", "5A", "Matemática", "1º", EvaluationType::Bimonthly);
        assert_eq!(table.find(&key).map(|r| r.row_index), Some(3));
        let absent = GradeKey::new("123", "5A", "Ciências", "1º", EvaluationType::Bimonthly);
        assert!(table.find(&absent).is_none());
    }

    #[test]
    fn unaccented_evaluation_labels_match_the_canonical_key() {
        let mut rows = sample_rows();
        rows.push(["Ana Silva", "123", "5A", "Manhã", "Ciências", "1º", "recuperacao", "4", "Rui Lima", "P02"]);
        rows.push(["Ana Silva", "123", "5A", "Manhã", "Ciências", "1º", "RECUPERACAO FINAL", "6", "Rui Lima", "P02"]);
        let table =
            GradeTable::from_snapshot(&grade_snapshot(&rows), &columns::ENTRY).expect("table");

        let recovery = GradeKey::new("123", "5A", "Ciências", "1º", EvaluationType::Recovery);
        let found = table.find(&recovery).expect("recovery row");
        assert_eq!(found.row_index, 8);
        assert_eq!(found.evaluation_type, "RECUPERAÇÃO");

        let final_recovery =
            GradeKey::new("123", "5A", "Ciências", "1º", EvaluationType::FinalRecovery);
        assert_eq!(table.find(&final_recovery).map(|r| r.row_index), Some(9));
    }

    #[test]
    fn teacher_scopes_classes_and_subjects() {
        let table = table();
        assert_eq!(table.teacher_classes("p02"), vec!["5A", "6B"]);
        assert_eq!(table.teacher_subjects("P01", "5A"), vec!["MATEMÁTICA"]);
        assert!(table.teacher_classes("P99").is_empty());
    }

    #[test]
    fn roster_is_unique_per_registration() {
        let roster = table().roster("5A");
        let ids: Vec<&str> = roster.iter().map(|e| e.registration_id.as_str()).collect();
        assert_eq!(ids, vec!["123", "456"]);
        assert_eq!(roster[0].shift, "Manhã");
    }
}
