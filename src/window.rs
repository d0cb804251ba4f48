use chrono::NaiveDate;

use crate::error::{GradebookError, Result};
use crate::models::{normalize_key, ReleaseWindow};
use crate::schema::{columns, SheetSchema};
use crate::sheet::SheetSnapshot;

pub const DATE_FORMAT: &str = "%d/%m/%Y";

pub fn release_windows(snapshot: &SheetSnapshot) -> Result<Vec<ReleaseWindow>> {
    let schema = SheetSchema::bind(&snapshot.sheet, &snapshot.headers, &columns::RELEASE_WINDOW)?;
    let cell = |cells: &[String], column: &str| -> String {
        schema.cell(cells, column).unwrap_or("").trim().to_string()
    };
    Ok(snapshot
        .rows
        .iter()
        .filter(|row| !cell(&row.cells, columns::PERIOD).is_empty())
        .map(|row| ReleaseWindow {
            period: cell(&row.cells, columns::PERIOD),
            start_date: cell(&row.cells, columns::WINDOW_START),
            end_date: cell(&row.cells, columns::WINDOW_END),
        })
        .collect())
}

/// Succeeds when `today` falls inside the window for `period`, bounds included.
pub fn validate_period(period: &str, windows: &[ReleaseWindow], today: NaiveDate) -> Result<()> {
    let wanted = normalize_key(period);
    let window = windows
        .iter()
        .find(|w| normalize_key(&w.period) == wanted)
        .ok_or_else(|| GradebookError::NotAuthorized {
            period: period.trim().to_string(),
        })?;

    let start = parse_date(&window.start_date)?;
    let end = parse_date(&window.end_date)?;
    if start > end {
        return Err(GradebookError::DateFormat(format!(
            "window for {} starts on {} after it ends on {}",
            window.period,
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        )));
    }

    if start <= today && today <= end {
        Ok(())
    } else {
        Err(GradebookError::WindowClosed {
            start: start.format(DATE_FORMAT).to_string(),
            end: end.format(DATE_FORMAT).to_string(),
        })
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| GradebookError::DateFormat(format!("{value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::SheetRow;

    fn window(period: &str, start: &str, end: &str) -> ReleaseWindow {
        ReleaseWindow {
            period: period.to_string(),
            start_date: start.to_string(),
            end_date: end.to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn bounds_are_inclusive() {
        let windows = vec![window("1º", "01/03/2026", "15/03/2026")];
        assert!(validate_period("1º", &windows, date(2026, 3, 1)).is_ok());
        assert!(validate_period("1º", &windows, date(2026, 3, 15)).is_ok());
        assert!(validate_period(" 1º ", &windows, date(2026, 3, 8)).is_ok());
    }

    #[test]
    fn outside_range_reports_window() {
        let windows = vec![window("1º", "01/03/2026", "15/03/2026")];
        match validate_period("1º", &windows, date(2026, 3, 16)) {
            Err(GradebookError::WindowClosed { start, end }) => {
                assert_eq!(start, "01/03/2026");
                assert_eq!(end, "15/03/2026");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_period_is_not_authorized() {
        let windows = vec![window("1º", "01/03/2026", "15/03/2026")];
        assert!(matches!(
            validate_period("2º", &windows, date(2026, 3, 2)),
            Err(GradebookError::NotAuthorized { .. })
        ));
    }

    #[test]
    fn period_match_ignores_case() {
        let windows = vec![window("final", "01/12/2026", "20/12/2026")];
        assert!(validate_period("Final", &windows, date(2026, 12, 5)).is_ok());
    }

    #[test]
    fn malformed_dates_surface_as_date_format() {
        let windows = vec![window("1º", "2026-03-01", "15/03/2026")];
        assert!(matches!(
            validate_period("1º", &windows, date(2026, 3, 2)),
            Err(GradebookError::DateFormat(_))
        ));
        let inverted = vec![window("1º", "15/03/2026", "01/03/2026")];
        assert!(matches!(
            validate_period("1º", &inverted, date(2026, 3, 2)),
            Err(GradebookError::DateFormat(_))
        ));
    }

    #[test]
    fn loads_windows_from_sheet() {
        let snapshot = SheetSnapshot {
            sheet: "Controle_Liberacao".to_string(),
            headers: vec!["Bimestre".into(), "Data Início".into(), "Data Fim".into()],
            rows: vec![
                SheetRow {
                    row_index: 2,
                    cells: vec!["1º".into(), "01/03/2026".into(), "15/03/2026".into()],
                },
                SheetRow {
                    row_index: 3,
                    cells: vec!["".into(), "".into(), "".into()],
                },
            ],
        };
        let windows = release_windows(&snapshot).expect("windows");
        assert_eq!(windows, vec![window("1º", "01/03/2026", "15/03/2026")]);
    }
}
