use std::collections::HashMap;
use std::fmt;

use crate::error::{GradebookError, Result};

pub mod columns {
    pub const CLASS: &str = "Série";
    pub const STUDENT_NAME: &str = "Nome do Aluno";
    pub const REGISTRATION: &str = "Matrícula";
    pub const SHIFT: &str = "Turno";
    pub const SUBJECT: &str = "Componente Curricular";
    pub const PERIOD: &str = "Bimestre";
    pub const EVALUATION: &str = "Tipo de Avaliação";
    pub const SCORE: &str = "Nota";
    pub const TEACHER_NAME: &str = "Professor";
    pub const TEACHER_REGISTRATION: &str = "Mat_Professor";

    pub const WINDOW_START: &str = "Data Início";
    pub const WINDOW_END: &str = "Data Fim";

    pub const QUERY: [&str; 7] = [
        CLASS,
        STUDENT_NAME,
        REGISTRATION,
        PERIOD,
        SUBJECT,
        EVALUATION,
        SCORE,
    ];

    pub const ENTRY: [&str; 9] = [
        CLASS,
        STUDENT_NAME,
        REGISTRATION,
        PERIOD,
        SUBJECT,
        EVALUATION,
        SCORE,
        SHIFT,
        TEACHER_REGISTRATION,
    ];

    pub const RELEASE_WINDOW: [&str; 3] = [PERIOD, WINDOW_START, WINDOW_END];

    pub const GRADE_SHEET_LAYOUT: [&str; 10] = [
        STUDENT_NAME,
        REGISTRATION,
        CLASS,
        SHIFT,
        SUBJECT,
        PERIOD,
        EVALUATION,
        SCORE,
        TEACHER_NAME,
        TEACHER_REGISTRATION,
    ];
}

#[derive(Debug, Clone)]
pub struct SheetSchema {
    headers: Vec<String>,
    positions: HashMap<String, usize>,
}

impl SheetSchema {
    /// Binds a header row, failing when any `required` column is missing.
    pub fn bind(sheet: &str, headers: &[String], required: &[&str]) -> Result<Self> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(GradebookError::Configuration(format!(
                "sheet {sheet} is empty"
            )));
        }

        let mut positions = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            // First occurrence wins for duplicated headers.
            positions.entry(header.trim().to_string()).or_insert(idx);
        }

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| !positions.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(GradebookError::Configuration(format!(
                "sheet {sheet} is missing required columns: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            headers: headers.to_vec(),
            positions,
        })
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn cell<'a>(&self, cells: &'a [String], column: &str) -> Option<&'a str> {
        let idx = self.position(column)?;
        Some(cells.get(idx).map(String::as_str).unwrap_or(""))
    }

    pub fn address(&self, column: &str, row_index: usize) -> Result<CellAddress> {
        let column_idx = self.position(column).ok_or_else(|| {
            GradebookError::Configuration(format!("column {column} is not bound"))
        })?;
        Ok(CellAddress {
            column: column_idx,
            row: row_index,
        })
    }

    /// Lays `values` out in header order. Unbound columns are dropped, unnamed ones left blank.
    pub fn layout_row(&self, values: &[(&str, String)]) -> Vec<String> {
        let mut row = vec![String::new(); self.headers.len()];
        for (column, value) in values {
            if let Some(idx) = self.position(column) {
                row[idx] = value.clone();
            }
        }
        row
    }
}

pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[cfg(test)]
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        n = n.checked_mul(26)?.checked_add((c as u8 - b'A') as usize + 1)?;
    }
    Some(n - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub column: usize,
    pub row: usize,
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letter(self.column), self.row)
    }
}

#[cfg(test)]
impl std::str::FromStr for CellAddress {
    type Err = GradebookError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_uppercase();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| GradebookError::InvalidInput(format!("bad cell address: {s}")))?;
        let (letters, digits) = s.split_at(split);
        let column = column_index(letters)
            .ok_or_else(|| GradebookError::InvalidInput(format!("bad cell address: {s}")))?;
        let row = digits
            .parse::<usize>()
            .ok()
            .filter(|r| *r >= 1)
            .ok_or_else(|| GradebookError::InvalidInput(format!("bad cell address: {s}")))?;
        Ok(CellAddress { column, row })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn binds_grade_layout_and_finds_score_column() {
        let schema = SheetSchema::bind(
            "Notas_Tabela",
            &headers(&columns::GRADE_SHEET_LAYOUT),
            &columns::ENTRY,
        )
        .expect("bind");
        let address = schema.address(columns::SCORE, 12).expect("address");
        assert_eq!(address.to_string(), "H12");
    }

    #[test]
    fn missing_score_column_fails_loudly() {
        let err = SheetSchema::bind(
            "Notas_Tabela",
            &headers(&["Série", "Nome do Aluno", "Matrícula"]),
            &columns::QUERY,
        )
        .expect_err("must fail");
        match err {
            GradebookError::Configuration(msg) => assert!(msg.contains("Nota")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_header_row_is_an_empty_sheet() {
        let err = SheetSchema::bind("Notas_Tabela", &[], &columns::QUERY).expect_err("empty");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn column_letters_roll_past_z() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(7), "H");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
        for idx in [0, 7, 25, 26, 51, 701, 702] {
            assert_eq!(column_index(&column_letter(idx)), Some(idx));
        }
    }

    #[test]
    fn parses_cell_addresses() {
        let address: CellAddress = "ab7".parse().expect("parse");
        assert_eq!(address, CellAddress { column: 27, row: 7 });
        assert!("H0".parse::<CellAddress>().is_err());
        assert!("12".parse::<CellAddress>().is_err());
    }

    #[test]
    fn layout_follows_header_order() {
        let schema = SheetSchema::bind(
            "Notas_Tabela",
            &headers(&["Nota", "Matrícula", "Extra"]),
            &["Nota"],
        )
        .expect("bind");
        let row = schema.layout_row(&[
            ("Matrícula", "123".to_string()),
            ("Nota", "7.50".to_string()),
            ("Turno", "MANHÃ".to_string()),
        ]);
        assert_eq!(row, vec!["7.50", "123", ""]);
    }
}
