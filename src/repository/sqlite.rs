//! SQLite-backed repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;
use tracing::{debug, info};

use super::{ModelDraft, ModelRepository, RepoResult, StoredModel, TrainingExample};
use crate::error::RepositoryError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteModelRepository {
    db_path: PathBuf,
}

fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn parse_timestamp(raw: &str) -> RepoResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

type ModelRow = (String, i64, String, String, String, i64);

fn model_from_row(row: ModelRow) -> RepoResult<StoredModel> {
    let (name, version, created_at, model, metrics, training_count) = row;
    Ok(StoredModel {
        name,
        version: version as u32,
        created_at: parse_timestamp(&created_at)?,
        model: serde_json::from_str(&model)?,
        metrics: serde_json::from_str(&metrics)?,
        training_count: training_count as usize,
    })
}

fn insert_model(conn: &Connection, model: &StoredModel) -> RepoResult<()> {
    let result = conn.execute(
        "INSERT INTO models (name, version, created_at, model, metrics, training_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            &model.name,
            i64::from(model.version),
            model.created_at.to_rfc3339(),
            serde_json::to_string(&model.model)?,
            serde_json::to_string(&model.metrics)?,
            model.training_count as i64,
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(RepositoryError::VersionConflict {
                name: model.name.clone(),
                version: model.version,
            })
        }
        Err(e) => Err(e.into()),
    }
}

impl SqliteModelRepository {
    pub async fn new(db_path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let path_clone = path.clone();

        task::spawn_blocking(move || {
            let conn = open(&path_clone)?;

            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS examples (
                    id TEXT PRIMARY KEY,
                    features TEXT NOT NULL,
                    label REAL NOT NULL,
                    meta TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS models (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    model TEXT NOT NULL,
                    metrics TEXT NOT NULL,
                    training_count INTEGER NOT NULL,
                    UNIQUE (name, version)
                );
                CREATE INDEX IF NOT EXISTS idx_models_name ON models(name, version);
                "#,
            )?;

            Ok::<_, RepositoryError>(())
        })
        .await??;

        info!("Model repository ready at {}", path.display());
        Ok(Self { db_path: path })
    }
}

#[async_trait]
impl ModelRepository for SqliteModelRepository {
    async fn save_model(&self, model: StoredModel) -> RepoResult<()> {
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = open(&path)?;
            insert_model(&conn, &model)?;
            debug!(name = %model.name, version = model.version, "Model saved");
            Ok::<_, RepositoryError>(())
        })
        .await?
    }

    async fn commit_model(&self, draft: ModelDraft) -> RepoResult<StoredModel> {
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let mut conn = open(&path)?;
            // IMMEDIATE takes the write lock up front, so the read of MAX(version)
            // and the insert cannot interleave with another committer.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let version: i64 = tx.query_row(
                "SELECT COALESCE(MAX(version), 0) + 1 FROM models WHERE name = ?1",
                params![&draft.name],
                |row| row.get(0),
            )?;
            let stored = StoredModel {
                name: draft.name,
                version: version as u32,
                created_at: Utc::now(),
                model: draft.model,
                metrics: draft.metrics,
                training_count: draft.training_count,
            };
            insert_model(&tx, &stored)?;
            tx.commit()?;

            info!(name = %stored.name, version = stored.version, "Model version committed");
            Ok::<_, RepositoryError>(stored)
        })
        .await?
    }

    async fn get_latest_model(&self, name: &str) -> RepoResult<Option<StoredModel>> {
        let path = self.db_path.clone();
        let name = name.to_string();

        task::spawn_blocking(move || {
            let conn = open(&path)?;
            let row: Option<ModelRow> = conn
                .query_row(
                    "SELECT name, version, created_at, model, metrics, training_count
                     FROM models
                     WHERE name = ?1
                     ORDER BY version DESC, created_at DESC
                     LIMIT 1",
                    params![&name],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .optional()?;

            row.map(model_from_row).transpose()
        })
        .await?
    }

    async fn add_example(&self, example: TrainingExample) -> RepoResult<()> {
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = open(&path)?;
            conn.execute(
                "INSERT INTO examples (id, features, label, meta, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &example.id,
                    serde_json::to_string(&example.features)?,
                    example.label,
                    serde_json::to_string(&example.meta)?,
                    example.created_at.to_rfc3339(),
                ],
            )?;
            Ok::<_, RepositoryError>(())
        })
        .await?
    }

    async fn get_all_examples(&self) -> RepoResult<Vec<TrainingExample>> {
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = open(&path)?;
            let mut stmt = conn.prepare(
                "SELECT id, features, label, meta, created_at FROM examples ORDER BY rowid ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(id, features, label, meta, created_at)| {
                    Ok(TrainingExample {
                        id,
                        features: serde_json::from_str(&features)?,
                        label,
                        meta: serde_json::from_str(&meta)?,
                        created_at: parse_timestamp(&created_at)?,
                    })
                })
                .collect::<RepoResult<Vec<_>>>()
        })
        .await?
    }

    async fn count_examples(&self) -> RepoResult<usize> {
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = open(&path)?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM examples", [], |row| row.get(0))?;
            Ok::<_, RepositoryError>(count as usize)
        })
        .await?
    }
}
