use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::error::{GradebookError, Result};
use crate::models::{EvaluationType, GradeRecord, SubjectAverage};
use crate::recovery;
use crate::table::GradeTable;

pub const FINAL_PERIOD: &str = "Final";

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub class_label: String,
    pub student_name: String,
    pub registration_id: String,
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Bulletin(Bulletin),
    NoGrades,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BulletinColumn {
    Evaluation(EvaluationType),
    Average,
}

impl BulletinColumn {
    pub fn header(self) -> &'static str {
        match self {
            BulletinColumn::Evaluation(kind) => kind.short_label(),
            BulletinColumn::Average => "Med",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulletinRow {
    pub subject: String,
    pub cells: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bulletin {
    pub student_name: String,
    pub class_label: String,
    pub period: String,
    pub columns: Vec<BulletinColumn>,
    pub rows: Vec<BulletinRow>,
    pub averages: Vec<SubjectAverage>,
    pub recovery_notices: Vec<String>,
    pub recovery_subjects: Vec<String>,
    pub records: Vec<GradeRecord>,
}

pub fn selectable_periods(
    table: &GradeTable,
    class_label: &str,
    student_name: &str,
) -> Vec<String> {
    let mut periods = table.periods_for_student(class_label, student_name);
    if !periods.iter().any(|p| p.eq_ignore_ascii_case(FINAL_PERIOD)) {
        periods.push(FINAL_PERIOD.to_string());
    }
    periods
}

pub fn consult(table: &GradeTable, request: &QueryRequest) -> Result<QueryOutcome> {
    let enrollees = table.students_in_class(&request.class_label);
    if !crate::identity::validate_student(
        &request.student_name,
        &request.registration_id,
        &enrollees,
    ) {
        return Err(GradebookError::NotFound(
            "registration does not match the selected student".to_string(),
        ));
    }

    let rows = table.student_rows(
        &request.student_name,
        &request.registration_id,
        &request.class_label,
        &request.period,
    );
    if rows.is_empty() {
        info!(class = %request.class_label, period = %request.period, "no grades for period");
        return Ok(QueryOutcome::NoGrades);
    }

    Ok(QueryOutcome::Bulletin(build_bulletin(&rows)))
}

fn build_bulletin(rows: &[&GradeRecord]) -> Bulletin {
    // Evaluation columns in type order, then the average last.
    let mut columns: Vec<BulletinColumn> = EvaluationType::ALL
        .into_iter()
        .filter(|kind| rows.iter().any(|r| r.evaluation() == Some(*kind)))
        .map(BulletinColumn::Evaluation)
        .collect();
    columns.push(BulletinColumn::Average);

    let averages = recovery::subject_averages(rows);

    // Pivot rows come out sorted by subject; the first grade per type wins.
    let mut pivot: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        let cells = pivot
            .entry(row.subject.as_str())
            .or_insert_with(|| vec![None; columns.len()]);
        for (idx, column) in columns.iter().enumerate() {
            match column {
                BulletinColumn::Evaluation(kind) if row.evaluation() == Some(*kind) => {
                    cells[idx].get_or_insert(row.score);
                }
                BulletinColumn::Average => {
                    cells[idx] = averages
                        .iter()
                        .find(|a| a.subject == row.subject)
                        .map(|a| a.average);
                }
                _ => {}
            }
        }
    }

    let first = rows[0];
    Bulletin {
        student_name: first.student_name.clone(),
        class_label: first.class_label.clone(),
        period: first.period.clone(),
        rows: pivot
            .into_iter()
            .map(|(subject, cells)| BulletinRow {
                subject: subject.to_string(),
                cells,
            })
            .collect(),
        columns,
        recovery_notices: recovery::recovery_notices(&averages),
        recovery_subjects: recovery::recovery_subjects(&averages),
        averages,
        records: rows.iter().map(|r| (*r).clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::columns;
    use crate::table::fixtures::grade_snapshot;

    fn scenario_table() -> GradeTable {
        let rows = [
            ["ANA SILVA", "123", "5A", "Manhã", "MATEMÁTICA", "1º", "MENSAL", "5.0", "Carla", "P01"],
            ["ANA SILVA", "123", "5A", "Manhã", "MATEMÁTICA", "1º", "BIMESTRAL", "9,0", "Carla", "P01"],
            ["ANA SILVA", "123", "5A", "Manhã", "CIÊNCIAS", "1º", "MENSAL", "4", "Rui", "P02"],
            ["ANA SILVA", "123", "5A", "Manhã", "CIÊNCIAS", "1º", "RECUPERAÇÃO", "8", "Rui", "P02"],
            ["ANA SILVA", "123", "5A", "Manhã", "MATEMÁTICA", "2º", "MENSAL", "3", "Carla", "P01"],
        ];
        GradeTable::from_snapshot(&grade_snapshot(&rows), &columns::QUERY).expect("table")
    }

    fn request(registration_id: &str, period: &str) -> QueryRequest {
        QueryRequest {
            class_label: "5A".to_string(),
            student_name: "Ana Silva".to_string(),
            registration_id: registration_id.to_string(),
            period: period.to_string(),
        }
    }

    #[test]
    fn builds_the_scenario_bulletin() {
        let outcome = consult(&scenario_table(), &request("123", "1º")).expect("consult");
        let QueryOutcome::Bulletin(bulletin) = outcome else {
            panic!("expected a bulletin");
        };

        let headers: Vec<&str> = bulletin.columns.iter().map(|c| c.header()).collect();
        assert_eq!(headers, vec!["Men", "Bim", "Rec", "Med"]);

        assert_eq!(bulletin.rows[0].subject, "CIÊNCIAS");
        assert_eq!(bulletin.rows[0].cells, vec![Some(4.0), None, Some(8.0), Some(2.0)]);
        assert_eq!(bulletin.rows[1].subject, "MATEMÁTICA");
        assert_eq!(bulletin.rows[1].cells, vec![Some(5.0), Some(9.0), None, Some(7.0)]);

        assert_eq!(bulletin.recovery_notices, vec!["CIÊNCIAS (Média: 2.00)"]);
        assert_eq!(bulletin.recovery_subjects, vec!["CIÊNCIAS"]);
        assert_eq!(bulletin.records.len(), 4);
    }

    #[test]
    fn wrong_registration_is_rejected() {
        let err = consult(&scenario_table(), &request("999", "1º")).expect_err("rejected");
        assert!(matches!(err, GradebookError::NotFound(_)));
    }

    #[test]
    fn empty_period_has_no_grades() {
        let outcome = consult(&scenario_table(), &request("123", "Final")).expect("consult");
        assert_eq!(outcome, QueryOutcome::NoGrades);
    }

    #[test]
    fn final_period_is_always_selectable() {
        let periods = selectable_periods(&scenario_table(), "5A", "ana silva");
        assert_eq!(periods, vec!["1º", "2º", "Final"]);
    }
}
