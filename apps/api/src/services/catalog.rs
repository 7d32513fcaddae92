//! Read-only access to the user and item pools recommendations are built from.

use crate::{
    error::{ApiError, Result},
    models::{ItemText, TargetType},
};
use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, Trim};
use sqlx::SqlitePool;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const USERS_FILE: &str = "users.csv";
pub const ITEMS_FILE: &str = "items.csv";

#[async_trait]
pub trait EntityCatalog: Send + Sync {
    /// All user ids, in source order.
    async fn list_user_ids(&self) -> Result<Vec<i64>>;

    /// All items with their title-and-description text, in source order.
    async fn list_item_texts(&self) -> Result<Vec<ItemText>>;

    async fn exists(&self, target_type: TargetType, id: i64) -> Result<bool>;

    async fn list_item_ids(&self) -> Result<Vec<i64>> {
        Ok(self
            .list_item_texts()
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect())
    }
}

/// Entity pools exported as `users.csv` / `items.csv` in a data directory.
#[derive(Debug, Clone)]
pub struct CsvCatalog {
    data_dir: PathBuf,
}

impl CsvCatalog {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn open(&self, file_name: &str) -> Result<CsvTable> {
        let path = self.data_dir.join(file_name);
        if !path.exists() {
            return Err(ApiError::MissingPrerequisite(format!(
                "{} not found in {}",
                file_name,
                self.data_dir.display()
            )));
        }
        CsvTable::read(&path)
    }

    /// Integer ids from one column. Blank cells are skipped; anything else
    /// that does not parse is a `DataError`.
    fn read_ids(&self, file_name: &str, column_name: &str) -> Result<Vec<i64>> {
        let table = self.open(file_name)?;
        let column = table.require_column(column_name)?;

        let mut ids = Vec::new();
        for record in &table.records {
            let Some(raw) = table.value(record, column) else {
                continue;
            };
            let id = raw.parse().map_err(|_| {
                ApiError::DataError(format!(
                    "Invalid {} '{}' in {}",
                    column_name,
                    raw,
                    table.path.display()
                ))
            })?;
            ids.push(id);
        }

        non_empty(ids, &table.path.display().to_string())
    }
}

#[async_trait]
impl EntityCatalog for CsvCatalog {
    async fn list_user_ids(&self) -> Result<Vec<i64>> {
        self.read_ids(USERS_FILE, "UserID")
    }

    /// Unlike `list_item_texts`, a malformed `Item` id fails the pool.
    async fn list_item_ids(&self) -> Result<Vec<i64>> {
        self.read_ids(ITEMS_FILE, "Item")
    }

    async fn list_item_texts(&self) -> Result<Vec<ItemText>> {
        let table = self.open(ITEMS_FILE)?;
        let id_column = table.require_column("Item")?;
        let title_column = table.column("Title");
        let description_column = table.column("Descriptions");

        let mut items = Vec::new();
        let mut skipped = 0usize;
        for record in &table.records {
            let Some(id) = table
                .value(record, id_column)
                .and_then(|raw| raw.parse::<i64>().ok())
            else {
                skipped += 1;
                continue;
            };

            let title = title_column.and_then(|c| table.value(record, c));
            let description = description_column.and_then(|c| table.value(record, c));
            items.push(ItemText::from_parts(id, title, description));
        }

        if skipped > 0 {
            debug!(
                "Skipped {} rows without a numeric Item id in {}",
                skipped,
                table.path.display()
            );
        }

        non_empty(items, &table.path.display().to_string())
    }

    async fn exists(&self, target_type: TargetType, id: i64) -> Result<bool> {
        let found = match target_type {
            TargetType::User => self.list_user_ids().await?.contains(&id),
            TargetType::Item => self.list_item_ids().await?.contains(&id),
        };
        Ok(found)
    }
}

/// A parsed CSV file with normalized header names.
struct CsvTable {
    path: PathBuf,
    headers: Vec<String>,
    records: Vec<StringRecord>,
}

impl CsvTable {
    fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(file);

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let records = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            records,
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| {
            ApiError::DataError(format!(
                "Column '{}' missing from {}",
                name,
                self.path.display()
            ))
        })
    }

    /// Trimmed cell value, `None` when absent or blank.
    fn value<'r>(&self, record: &'r StringRecord, column: usize) -> Option<&'r str> {
        record
            .get(column)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Entity tables written by the ingestion step.
#[derive(Debug, Clone)]
pub struct SqlCatalog {
    pool: SqlitePool,
}

impl SqlCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityCatalog for SqlCatalog {
    async fn list_user_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        non_empty(ids, "users table")
    }

    async fn list_item_texts(&self) -> Result<Vec<ItemText>> {
        let rows = sqlx::query_as::<_, (i64, Option<String>, Option<String>)>(
            "SELECT id, title, description FROM items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|(id, title, description)| {
                ItemText::from_parts(id, title.as_deref(), description.as_deref())
            })
            .collect();
        non_empty(items, "items table")
    }

    async fn exists(&self, target_type: TargetType, id: i64) -> Result<bool> {
        // table name comes from a closed enum, never from the request
        let query = format!("SELECT 1 FROM {} WHERE id = ?", target_type.table());
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn non_empty<T>(values: Vec<T>, source: &str) -> Result<Vec<T>> {
    if values.is_empty() {
        return Err(ApiError::DataError(format!(
            "No identifiers found in {}",
            source
        )));
    }
    Ok(values)
}
