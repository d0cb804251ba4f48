use async_trait::async_trait;

use crate::error::Result;
use crate::schema::CellAddress;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetSnapshot {
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub row_index: usize,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub address: CellAddress,
    pub value: String,
}

impl SheetSnapshot {
    pub fn is_empty(&self) -> bool {
        self.headers.iter().all(|h| h.trim().is_empty()) && self.rows.is_empty()
    }
}

#[async_trait]
pub trait GradeSheet: Send + Sync {
    fn name(&self) -> &str;

    async fn read_all(&self) -> Result<SheetSnapshot>;

    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<()>;

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<()>;
}
