use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{GradebookError, Result};
use crate::models::{normalize_key, EvaluationType, Enrollee, GradeKey, TeacherIdentity};
use crate::schema::columns;
use crate::session::GradebookSession;
use crate::table::GradeTable;
use crate::upsert::{self, EntryContext, ScoreEntry};
use crate::window;

#[derive(Debug, Clone)]
pub struct EntryRequest {
    pub class_label: String,
    pub subject: String,
    pub period: String,
    pub evaluation_type: EvaluationType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterLine {
    pub student: Enrollee,
    pub existing_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionReport {
    pub appended: usize,
    pub updated: Vec<String>,
    pub notices: Vec<String>,
    pub errors: Vec<String>,
}

impl SubmissionReport {
    pub fn nothing_entered(&self) -> bool {
        self.appended == 0
            && self.updated.is_empty()
            && self.notices.is_empty()
            && self.errors.is_empty()
    }
}

pub const NOTHING_ENTERED: &str = "No grades were entered (all scores were 0.0).";

pub fn teacher_scope(
    table: &GradeTable,
    teacher: &TeacherIdentity,
) -> Result<Vec<(String, Vec<String>)>> {
    let classes = table.teacher_classes(&teacher.registration_id);
    if classes.is_empty() {
        return Err(GradebookError::NotFound(
            "no class is linked to this registration".to_string(),
        ));
    }
    Ok(classes
        .into_iter()
        .map(|class| {
            let subjects = table.teacher_subjects(&teacher.registration_id, &class);
            (class, subjects)
        })
        .collect())
}

async fn open_gates(
    session: &mut GradebookSession,
    teacher: &TeacherIdentity,
    request: &EntryRequest,
    today: NaiveDate,
) -> Result<GradeTable> {
    if request.class_label.trim().is_empty()
        || request.subject.trim().is_empty()
        || request.period.trim().is_empty()
    {
        return Err(GradebookError::InvalidInput(
            "select class, subject, period and evaluation type".to_string(),
        ));
    }

    let table = session.grade_table(&columns::ENTRY).await?;

    let class_label = normalize_key(&request.class_label);
    if !table
        .teacher_classes(&teacher.registration_id)
        .contains(&class_label)
    {
        return Err(GradebookError::NotFound(format!(
            "class {class_label} is not linked to this registration"
        )));
    }
    let subject = normalize_key(&request.subject);
    if !table
        .teacher_subjects(&teacher.registration_id, &class_label)
        .contains(&subject)
    {
        return Err(GradebookError::NotFound(format!(
            "no subject {subject} available for class {class_label}"
        )));
    }

    let windows = session.release_windows().await?;
    window::validate_period(&request.period, &windows, today)?;

    Ok(table)
}

pub async fn open_roster(
    session: &mut GradebookSession,
    teacher: &TeacherIdentity,
    request: &EntryRequest,
    today: NaiveDate,
) -> Result<Vec<RosterLine>> {
    let table = open_gates(session, teacher, request, today).await?;
    let roster = table.roster(&request.class_label);
    if roster.is_empty() {
        return Err(GradebookError::NotFound(
            "no students found for this class".to_string(),
        ));
    }

    Ok(roster
        .into_iter()
        .map(|student| {
            let key = GradeKey::new(
                &student.registration_id,
                &request.class_label,
                &request.subject,
                &request.period,
                request.evaluation_type,
            );
            let existing_score = table.find(&key).map(|r| r.score).unwrap_or(0.0);
            RosterLine {
                student,
                existing_score,
            }
        })
        .collect())
}

/// Writes one batch of scores keyed by student registration.
///
/// Roster students missing from `scores` count as `0.0` and are skipped. After any
/// write attempt the session is invalidated and the grade sheet reloaded.
pub async fn submit(
    session: &mut GradebookSession,
    teacher: &TeacherIdentity,
    request: &EntryRequest,
    scores: &HashMap<String, f64>,
    overwrite: bool,
    today: NaiveDate,
) -> Result<SubmissionReport> {
    let table = open_gates(session, teacher, request, today).await?;
    let roster = table.roster(&request.class_label);
    if roster.is_empty() {
        return Err(GradebookError::NotFound(
            "no students found for this class".to_string(),
        ));
    }

    let scores: HashMap<String, f64> = scores
        .iter()
        .map(|(registration, score)| (normalize_key(registration), *score))
        .collect();

    let mut report = SubmissionReport::default();
    let mut unknown: Vec<&String> = scores
        .keys()
        .filter(|registration| !roster.iter().any(|s| &s.registration_id == *registration))
        .collect();
    unknown.sort();
    let class_key = normalize_key(&request.class_label);
    for registration in unknown {
        report.notices.push(format!(
            "Registration {registration} is not in class {class_key}. Ignored."
        ));
    }

    let entries: Vec<ScoreEntry> = roster
        .into_iter()
        .map(|student| {
            let score = scores.get(&student.registration_id).copied().unwrap_or(0.0);
            ScoreEntry { student, score }
        })
        .collect();

    let context = EntryContext {
        class_label: normalize_key(&request.class_label),
        subject: normalize_key(&request.subject),
        period: request.period.trim().to_string(),
        evaluation_type: request.evaluation_type,
        teacher: teacher.clone(),
    };
    let plan = upsert::plan_upsert(&table, &context, &entries, overwrite)?;
    report.updated = plan.updated.clone();
    report.notices.extend(plan.notices.iter().cloned());

    let submission_id = Uuid::new_v4();
    let span = info_span!(
        "submission",
        %submission_id,
        class = %context.class_label,
        subject = %context.subject,
        period = %context.period,
        evaluation = %context.evaluation_type,
    );
    let writes = upsert::execute_plan(session.grade_sheet(), &plan)
        .instrument(span)
        .await;

    if writes.updated == 0 {
        report.updated.clear();
    }
    report.appended = writes.appended;
    report.errors = writes.errors;

    if writes.attempted {
        session.invalidate();
        session.grade_table(&columns::ENTRY).await?;
    }

    info!(
        %submission_id,
        appended = report.appended,
        updated = report.updated.len(),
        notices = report.notices.len(),
        errors = report.errors.len(),
        "submission finished"
    );
    Ok(report)
}
