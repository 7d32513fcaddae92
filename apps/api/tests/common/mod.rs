#![allow(dead_code)]

use recsys_api::services::RecommendationStore;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub db_path: PathBuf,
}

impl Fixture {
    /// A data directory with a SQLite database holding `users` and `items`,
    /// plus matching `users.csv` / `items.csv` files.
    pub async fn new(user_ids: &[i64], items: &[(i64, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("data.db");

        let pool = create_database(&db_path).await;
        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY, title TEXT, description TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        for id in user_ids {
            sqlx::query("INSERT INTO users (id) VALUES (?)")
                .bind(id)
                .execute(&pool)
                .await
                .unwrap();
        }
        for (id, title) in items {
            sqlx::query("INSERT INTO items (id, title) VALUES (?, ?)")
                .bind(id)
                .bind(*title)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool.close().await;

        write_csv(dir.path(), user_ids, items);

        Self { dir, db_path }
    }

    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    pub async fn store(&self) -> RecommendationStore {
        let store = RecommendationStore::connect(&self.db_path).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }
}

async fn create_database(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap()
}

fn write_csv(dir: &Path, user_ids: &[i64], items: &[(i64, &str)]) {
    let mut users = String::from("UserID\n");
    for id in user_ids {
        users.push_str(&format!("{}\n", id));
    }
    std::fs::write(dir.join("users.csv"), users).unwrap();

    let mut rows = String::from("Item,Title,Descriptions\n");
    for (id, title) in items {
        rows.push_str(&format!("{},{},\n", id, title));
    }
    std::fs::write(dir.join("items.csv"), rows).unwrap();
}

pub async fn count_rows(store: &RecommendationStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM recommendations")
        .fetch_one(store.pool())
        .await
        .unwrap()
}
