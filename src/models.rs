use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::GradebookError;

/// Averages strictly below this mark a subject for recovery.
pub const RECOVERY_THRESHOLD: f64 = 7.0;

pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EvaluationType {
    #[serde(rename = "MENSAL")]
    Monthly,
    #[serde(rename = "BIMESTRAL")]
    Bimonthly,
    #[serde(rename = "RECUPERAÇÃO")]
    Recovery,
    #[serde(rename = "RECUPERAÇÃO FINAL")]
    FinalRecovery,
}

impl EvaluationType {
    pub const ALL: [EvaluationType; 4] = [
        EvaluationType::Monthly,
        EvaluationType::Bimonthly,
        EvaluationType::Recovery,
        EvaluationType::FinalRecovery,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EvaluationType::Monthly => "MENSAL",
            EvaluationType::Bimonthly => "BIMESTRAL",
            EvaluationType::Recovery => "RECUPERAÇÃO",
            EvaluationType::FinalRecovery => "RECUPERAÇÃO FINAL",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            EvaluationType::Monthly => "Men",
            EvaluationType::Bimonthly => "Bim",
            EvaluationType::Recovery => "Rec",
            EvaluationType::FinalRecovery => "Rec Final",
        }
    }
}

impl fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EvaluationType {
    type Err = GradebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "MENSAL" => Ok(EvaluationType::Monthly),
            "BIMESTRAL" => Ok(EvaluationType::Bimonthly),
            "RECUPERAÇÃO" | "RECUPERACAO" => Ok(EvaluationType::Recovery),
            "RECUPERAÇÃO FINAL" | "RECUPERACAO FINAL" => Ok(EvaluationType::FinalRecovery),
            other => Err(GradebookError::InvalidInput(format!(
                "unknown evaluation type: {other}"
            ))),
        }
    }
}

pub fn normalize_key(value: &str) -> String {
    value.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRecord {
    pub student_name: String,
    pub registration_id: String,
    pub class_label: String,
    pub shift: String,
    pub subject: String,
    pub period: String,
    pub evaluation_type: String,
    pub score: f64,
    pub teacher_name: String,
    pub teacher_registration_id: String,
    pub row_index: usize,
}

impl GradeRecord {
    pub fn evaluation(&self) -> Option<EvaluationType> {
        self.evaluation_type.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GradeKey {
    pub registration_id: String,
    pub class_label: String,
    pub subject: String,
    pub period: String,
    pub evaluation_type: String,
}

impl GradeKey {
    pub fn new(
        registration_id: &str,
        class_label: &str,
        subject: &str,
        period: &str,
        evaluation_type: EvaluationType,
    ) -> Self {
        Self {
            registration_id: normalize_key(registration_id),
            class_label: normalize_key(class_label),
            subject: normalize_key(subject),
            period: normalize_key(period),
            evaluation_type: evaluation_type.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollee {
    pub name: String,
    pub registration_id: String,
    pub shift: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherIdentity {
    pub name: String,
    pub registration_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseWindow {
    pub period: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAverage {
    pub subject: String,
    pub monthly: f64,
    pub bimonthly: f64,
    pub average: f64,
    pub needs_recovery: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_type_accepts_labels_and_aliases() {
        assert_eq!(
            " mensal ".parse::<EvaluationType>().ok(),
            Some(EvaluationType::Monthly)
        );
        assert_eq!(
            "recuperação final".parse::<EvaluationType>().ok(),
            Some(EvaluationType::FinalRecovery)
        );
        assert_eq!(
            "RECUPERACAO".parse::<EvaluationType>().ok(),
            Some(EvaluationType::Recovery)
        );
        assert!("PROVA".parse::<EvaluationType>().is_err());
    }

    #[test]
    fn grade_key_normalizes_every_part() {
        let key = GradeKey::new(" 123 ", "5a", "matemática", "1º", EvaluationType::Bimonthly);
        assert_eq!(key.registration_id, "123");
        assert_eq!(key.class_label, "5A");
        assert_eq!(key.subject, "MATEMÁTICA");
        assert_eq!(key.evaluation_type, "BIMESTRAL");
    }
}
