use tracing::{info, warn};

use crate::error::Result;
use crate::models::{EvaluationType, Enrollee, GradeKey, TeacherIdentity, MAX_SCORE};
use crate::schema::columns;
use crate::sheet::{CellUpdate, GradeSheet};
use crate::table::GradeTable;

#[derive(Debug, Clone)]
pub struct EntryContext {
    pub class_label: String,
    pub subject: String,
    pub period: String,
    pub evaluation_type: EvaluationType,
    pub teacher: TeacherIdentity,
}

#[derive(Debug, Clone)]
pub struct ScoreEntry {
    pub student: Enrollee,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertPlan {
    pub appends: Vec<Vec<String>>,
    pub updates: Vec<CellUpdate>,
    pub updated: Vec<String>,
    pub notices: Vec<String>,
}

impl UpsertPlan {
    pub fn is_empty(&self) -> bool {
        self.appends.is_empty() && self.updates.is_empty()
    }
}

pub fn format_score(score: f64) -> String {
    format!("{score:.2}")
}

/// Plans the writes for one submission.
///
/// A score of exactly `0.0` means the field was left blank and is never written,
/// so a real zero cannot be recorded here.
pub fn plan_upsert(
    table: &GradeTable,
    context: &EntryContext,
    entries: &[ScoreEntry],
    overwrite: bool,
) -> Result<UpsertPlan> {
    let schema = table.schema();
    let mut plan = UpsertPlan::default();

    for entry in entries {
        let student = &entry.student;
        if entry.score == 0.0 {
            continue;
        }
        if !entry.score.is_finite() || entry.score < 0.0 || entry.score > MAX_SCORE {
            plan.notices.push(format!(
                "Invalid score {} for {} ({}). Ignored.",
                entry.score, student.name, student.registration_id
            ));
            continue;
        }

        let key = GradeKey::new(
            &student.registration_id,
            &context.class_label,
            &context.subject,
            &context.period,
            context.evaluation_type,
        );
        let value = format_score(entry.score);

        match table.find(&key) {
            Some(existing) if overwrite => {
                let address = schema.address(columns::SCORE, existing.row_index)?;
                plan.updates.push(CellUpdate { address, value });
                plan.updated.push(format!(
                    "Updated: {} ({})",
                    student.name, student.registration_id
                ));
            }
            Some(_) => {
                plan.notices.push(format!(
                    "Existing grade for {} ({}). Ignored.",
                    student.name, student.registration_id
                ));
            }
            None => {
                plan.appends.push(schema.layout_row(&[
                    (columns::STUDENT_NAME, student.name.clone()),
                    (columns::REGISTRATION, student.registration_id.clone()),
                    (columns::CLASS, context.class_label.clone()),
                    (columns::SHIFT, student.shift.clone()),
                    (columns::SUBJECT, context.subject.clone()),
                    (columns::PERIOD, context.period.clone()),
                    (columns::EVALUATION, context.evaluation_type.label().to_string()),
                    (columns::SCORE, value),
                    (columns::TEACHER_NAME, context.teacher.name.clone()),
                    (columns::TEACHER_REGISTRATION, context.teacher.registration_id.clone()),
                ]));
            }
        }
    }

    Ok(plan)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    pub appended: usize,
    pub updated: usize,
    pub errors: Vec<String>,
    pub attempted: bool,
}

/// Sends the batch update, then the batch append. A failure in one does not stop
/// the other; failures are collected in the report.
pub async fn execute_plan<S: GradeSheet + ?Sized>(sheet: &S, plan: &UpsertPlan) -> WriteReport {
    let mut report = WriteReport::default();
    if plan.is_empty() {
        return report;
    }

    if !plan.updates.is_empty() {
        report.attempted = true;
        match sheet.batch_update(&plan.updates).await {
            Ok(()) => {
                report.updated = plan.updates.len();
                info!(sheet = sheet.name(), cells = plan.updates.len(), "batch update applied");
            }
            Err(err) => {
                warn!(sheet = sheet.name(), error = %err, "batch update failed");
                report
                    .errors
                    .push(format!("Batch update failed: {err}"));
            }
        }
    }

    if !plan.appends.is_empty() {
        report.attempted = true;
        match sheet.append_rows(&plan.appends).await {
            Ok(()) => {
                report.appended = plan.appends.len();
                info!(sheet = sheet.name(), rows = plan.appends.len(), "rows appended");
            }
            Err(err) => {
                warn!(sheet = sheet.name(), error = %err, "append failed");
                report.errors.push(format!("Saving grades failed: {err}"));
            }
        }
    }

    report
}
