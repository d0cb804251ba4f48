use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::{GradebookError, Result};
use crate::schema::{columns, SheetSchema};
use crate::sheet::{CellUpdate, GradeSheet, SheetRow, SheetSnapshot};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgSheet {
    pool: PgPool,
    name: String,
}

impl PgSheet {
    pub fn new(pool: PgPool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }
}

#[async_trait]
impl GradeSheet for PgSheet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_all(&self) -> Result<SheetSnapshot> {
        let records = sqlx::query(
            r#"
            SELECT row_index, array_replace(cells, NULL, '') AS cells
            FROM gradebook.sheet_rows
            WHERE sheet = $1
            ORDER BY row_index
            "#,
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        let mut snapshot = SheetSnapshot {
            sheet: self.name.clone(),
            ..SheetSnapshot::default()
        };

        for row in records {
            let row_index: i32 = row.get("row_index");
            let cells: Vec<String> = row.get("cells");
            if row_index == 1 {
                snapshot.headers = cells;
            } else {
                snapshot.rows.push(SheetRow {
                    row_index: row_index as usize,
                    cells,
                });
            }
        }

        Ok(snapshot)
    }

    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GradebookError::Write(e.to_string()))?;

        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE gradebook.sheet_rows
                SET cells[$3] = $4, updated_at = now()
                WHERE sheet = $1 AND row_index = $2
                "#,
            )
            .bind(&self.name)
            .bind(update.address.row as i32)
            .bind(update.address.column as i32 + 1)
            .bind(&update.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| GradebookError::Write(format!("{}: {e}", update.address)))?;

            if result.rows_affected() == 0 {
                return Err(GradebookError::Write(format!(
                    "{}: row does not exist",
                    update.address
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| GradebookError::Write(e.to_string()))
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<()> {
        let write_err = |e: sqlx::Error| GradebookError::Write(e.to_string());
        let mut tx = self.pool.begin().await.map_err(write_err)?;

        // Serializes row number allocation per sheet.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&self.name)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

        let last: i32 = sqlx::query(
            "SELECT COALESCE(MAX(row_index), 0) AS last FROM gradebook.sheet_rows WHERE sheet = $1",
        )
        .bind(&self.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_err)?
        .get("last");

        for (offset, cells) in rows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO gradebook.sheet_rows (sheet, row_index, cells) VALUES ($1, $2, $3)",
            )
            .bind(&self.name)
            .bind(last + 1 + offset as i32)
            .bind(cells)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)
    }
}

pub async fn seed<S: GradeSheet + ?Sized>(grades: &S, windows: &S) -> anyhow::Result<()> {
    if grades.read_all().await?.is_empty() {
        let mut rows = vec![columns::GRADE_SHEET_LAYOUT
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>()];
        let data = [
            ["ANA SILVA", "123", "5A", "MANHÃ", "MATEMÁTICA", "1º", "MENSAL", "5,0", "Carla Souza", "P01"],
            ["ANA SILVA", "123", "5A", "MANHÃ", "MATEMÁTICA", "1º", "BIMESTRAL", "9,0", "Carla Souza", "P01"],
            ["ANA SILVA", "123", "5A", "MANHÃ", "CIÊNCIAS", "1º", "MENSAL", "4,0", "Rui Lima", "P02"],
            ["BRUNO COSTA", "456", "5A", "MANHÃ", "MATEMÁTICA", "1º", "MENSAL", "8/5", "Carla Souza", "P01"],
            ["BRUNO COSTA", "456", "5A", "MANHÃ", "CIÊNCIAS", "1º", "MENSAL", "7", "Rui Lima", "P02"],
        ];
        rows.extend(data.iter().map(|r| r.iter().map(|c| c.to_string()).collect()));
        grades
            .append_rows(&rows)
            .await
            .context("failed to seed grade sheet")?;
    }

    if windows.read_all().await?.is_empty() {
        let mut rows = vec![columns::RELEASE_WINDOW
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>()];
        let data = [
            ["1º", "02/02/2026", "30/04/2026"],
            ["2º", "01/05/2026", "15/07/2026"],
            ["3º", "01/08/2026", "30/09/2026"],
            ["4º", "01/10/2026", "11/12/2026"],
            ["Final", "14/12/2026", "23/12/2026"],
        ];
        rows.extend(data.iter().map(|r| r.iter().map(|c| c.to_string()).collect()));
        windows
            .append_rows(&rows)
            .await
            .context("failed to seed release window sheet")?;
    }

    Ok(())
}

/// Loads a CSV file (with header) into `sheet`.
///
/// An empty sheet takes the CSV header as its own; otherwise each CSV row is laid
/// out by header name, and CSV columns the sheet does not have are dropped.
pub async fn import_csv<S: GradeSheet + ?Sized>(
    sheet: &S,
    csv_path: &Path,
    required: &[&str],
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let csv_headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    SheetSchema::bind(&csv_path.display().to_string(), &csv_headers, required)?;

    let mut rows = Vec::new();
    let snapshot = sheet.read_all().await?;
    let schema = if snapshot.is_empty() {
        rows.push(csv_headers.clone());
        SheetSchema::bind(sheet.name(), &csv_headers, required)?
    } else {
        SheetSchema::bind(sheet.name(), &snapshot.headers, required)?
    };

    let mut imported = 0usize;
    for result in reader.records() {
        let record = result?;
        let values: Vec<(&str, String)> = csv_headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.as_str(), value.trim().to_string()))
            .collect();
        if values.iter().all(|(_, v)| v.is_empty()) {
            continue;
        }
        rows.push(schema.layout_row(&values));
        imported += 1;
    }

    if imported > 0 {
        sheet
            .append_rows(&rows)
            .await
            .with_context(|| format!("failed to import {}", csv_path.display()))?;
    }
    info!(sheet = sheet.name(), rows = imported, "csv import finished");

    Ok(imported)
}
