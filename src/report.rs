use std::fmt::Write;

use crate::error::{GradebookError, Result};
use crate::models::GradeRecord;
use crate::query::Bulletin;
use crate::schema::columns;

pub const RECOVERY_REQUIRED: &str = "Recovery required for: ";
pub const RECOVERY_EXAM: &str = "THE STUDENT MUST TAKE THE RECOVERY EXAM IN: ";

pub fn render_bulletin(bulletin: &Bulletin) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Report Card");
    let _ = writeln!(
        output,
        "{} ({}), period {}",
        bulletin.student_name, bulletin.class_label, bulletin.period
    );
    let _ = writeln!(output);

    let headers: Vec<&str> = std::iter::once("Subject")
        .chain(bulletin.columns.iter().map(|c| c.header()))
        .collect();
    let _ = writeln!(output, "| {} |", headers.join(" | "));
    let _ = writeln!(
        output,
        "|{}",
        headers.iter().map(|_| "---|").collect::<String>()
    );
    for row in bulletin.rows.iter() {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| match cell {
                Some(value) => format!("{value:.2}"),
                None => "-".to_string(),
            })
            .collect();
        let _ = writeln!(output, "| {} | {} |", row.subject, cells.join(" | "));
    }

    if !bulletin.recovery_notices.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "{}{}",
            RECOVERY_REQUIRED,
            bulletin.recovery_notices.join(", ")
        );
        let _ = writeln!(
            output,
            "{}{}",
            RECOVERY_EXAM,
            bulletin.recovery_subjects.join(", ")
        );
    }

    output
}

pub fn export_csv(records: &[GradeRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            columns::CLASS,
            columns::STUDENT_NAME,
            columns::REGISTRATION,
            columns::SHIFT,
            columns::PERIOD,
            columns::SUBJECT,
            columns::EVALUATION,
            columns::SCORE,
            columns::TEACHER_NAME,
            columns::TEACHER_REGISTRATION,
        ])
        .map_err(|e| GradebookError::Write(e.to_string()))?;

    for record in records {
        let score = format!("{:.2}", record.score);
        writer
            .write_record([
                record.class_label.as_str(),
                record.student_name.as_str(),
                record.registration_id.as_str(),
                record.shift.as_str(),
                record.period.as_str(),
                record.subject.as_str(),
                record.evaluation_type.as_str(),
                score.as_str(),
                record.teacher_name.as_str(),
                record.teacher_registration_id.as_str(),
            ])
            .map_err(|e| GradebookError::Write(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| GradebookError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| GradebookError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{consult, QueryOutcome, QueryRequest};
    use crate::table::fixtures::{grade_snapshot, sample_rows};
    use crate::table::GradeTable;

    fn bulletin() -> Bulletin {
        let table = GradeTable::from_snapshot(&grade_snapshot(&sample_rows()), &columns::QUERY)
            .expect("table");
        let request = QueryRequest {
            class_label: "5A".to_string(),
            student_name: "ANA SILVA".to_string(),
            registration_id: "123".to_string(),
            period: "1º".to_string(),
        };
        match consult(&table, &request).expect("consult") {
            QueryOutcome::Bulletin(bulletin) => bulletin,
            QueryOutcome::NoGrades => panic!("expected grades"),
        }
    }

    #[test]
    fn renders_table_and_recovery_lines() {
        let output = render_bulletin(&bulletin());
        assert!(output.contains("| Subject | Men | Bim | Med |"));
        assert!(output.contains("| CIÊNCIAS | 4.00 | - | 2.00 |"));
        assert!(output.contains("| MATEMÁTICA | 5.00 | 9.00 | 7.00 |"));
        assert!(output.contains("Recovery required for: CIÊNCIAS (Média: 2.00)"));
        assert!(output.contains("RECOVERY EXAM IN: CIÊNCIAS"));
    }

    #[test]
    fn exports_filtered_rows_as_csv() {
        let bulletin = bulletin();
        let csv_text = export_csv(&bulletin.records).expect("export");
        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next(),
            Some("Série,Nome do Aluno,Matrícula,Turno,Bimestre,Componente Curricular,Tipo de Avaliação,Nota,Professor,Mat_Professor")
        );
        assert_eq!(
            lines.next(),
            Some("5A,Ana Silva,123,Manhã,1º,MATEMÁTICA,MENSAL,5.00,Carla Souza,P01")
        );
        assert_eq!(csv_text.lines().count(), 4);
    }

    #[test]
    fn export_writes_to_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bulletin.csv");
        std::fs::write(&path, export_csv(&bulletin().records).expect("export")).expect("write");
        let mut reader = csv::Reader::from_path(&path).expect("reader");
        assert_eq!(reader.records().count(), 3);
    }
}
