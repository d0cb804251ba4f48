use crate::models::{EvaluationType, GradeRecord, SubjectAverage, RECOVERY_THRESHOLD};

/// Per-subject average of the monthly and bimonthly scores of one student and period.
///
/// Subjects come out in first-seen order. When a subject carries more than one score
/// of the same type, the first one seen is used.
pub fn subject_averages(rows: &[&GradeRecord]) -> Vec<SubjectAverage> {
    let mut subjects: Vec<&str> = Vec::new();
    for row in rows {
        if !subjects.contains(&row.subject.as_str()) {
            subjects.push(&row.subject);
        }
    }

    subjects
        .into_iter()
        .map(|subject| {
            let monthly = first_score(rows, subject, EvaluationType::Monthly);
            let bimonthly = first_score(rows, subject, EvaluationType::Bimonthly);
            let average = average_of(monthly, bimonthly);
            SubjectAverage {
                subject: subject.to_string(),
                monthly,
                bimonthly,
                average,
                needs_recovery: needs_recovery(average),
            }
        })
        .collect()
}

fn first_score(rows: &[&GradeRecord], subject: &str, kind: EvaluationType) -> f64 {
    rows.iter()
        .find(|r| r.subject == subject && r.evaluation() == Some(kind))
        .map(|r| r.score)
        .unwrap_or(0.0)
}

pub fn average_of(monthly: f64, bimonthly: f64) -> f64 {
    if monthly > 0.0 || bimonthly > 0.0 {
        (monthly + bimonthly) / 2.0
    } else {
        0.0
    }
}

pub fn needs_recovery(average: f64) -> bool {
    average < RECOVERY_THRESHOLD
}

pub fn recovery_notices(averages: &[SubjectAverage]) -> Vec<String> {
    averages
        .iter()
        .filter(|a| a.needs_recovery)
        .map(|a| format!("{} (Média: {:.2})", a.subject, a.average))
        .collect()
}

pub fn recovery_subjects(averages: &[SubjectAverage]) -> Vec<String> {
    averages
        .iter()
        .filter(|a| a.needs_recovery)
        .map(|a| a.subject.clone())
        .collect()
}
