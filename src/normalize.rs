use std::sync::LazyLock;

use regex::Regex;

static SLASH_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}$").expect("valid slash decimal pattern"));

/// Cleans a raw grade cell into decimal text, `"0.0"` when nothing usable remains.
///
/// A value like `07/2024` does not look like `D/M` and degrades to `072024`.
pub fn clean_grade_text(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "0.0".to_string();
    };

    let mut value = raw.trim().replace(',', ".");

    if SLASH_DECIMAL.is_match(&value) {
        match value.split_once('/') {
            Some((whole, fraction)) => value = format!("{whole}.{fraction}"),
            None => return "0.0".to_string(),
        }
    }

    let stripped: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut groups = stripped.split('.');
    let value = match (groups.next(), groups.next()) {
        (Some(whole), Some(first)) => {
            let rest: String = groups.collect();
            format!("{whole}.{first}{rest}")
        }
        _ => stripped.clone(),
    };

    if value.is_empty() {
        "0.0".to_string()
    } else {
        value
    }
}

pub fn normalize_grade(raw: Option<&str>) -> f64 {
    clean_grade_text(raw).parse::<f64>().unwrap_or(0.0)
}
