// src/database.rs
use crate::host::RawCase;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::path::PathBuf;

/// Key under which the single workspace is stored.
pub const WORKSPACE_NAMESPACE: &str = "jsjudge.workspace";

/// Everything the user was working on: the prompt, the program and its cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub cases: Vec<RawCase>,
    #[serde(default)]
    pub api_key: Option<String>,
}

pub async fn init_db(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let db_path = get_db_path(database_url)?;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }
    }

    let absolute_path = if db_path.is_relative() {
        std::env::current_dir().map_err(sqlx::Error::Io)?.join(&db_path)
    } else {
        db_path
    };

    let db_url = format!("sqlite://{}?mode=rwc", absolute_path.display());
    log::info!("Connecting to workspace database at {}", absolute_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    log::debug!("Database migrations completed");
    Ok(())
}

fn get_db_path(database_url: &str) -> Result<PathBuf, sqlx::Error> {
    let path = database_url.strip_prefix("sqlite:").ok_or_else(|| {
        sqlx::Error::Configuration("DATABASE_URL must start with 'sqlite:'".into())
    })?;
    let path = path.trim_start_matches("//");
    if path.is_empty() {
        return Err(sqlx::Error::Configuration("DATABASE_URL has no file path".into()));
    }
    Ok(PathBuf::from(path))
}

pub async fn save_workspace(pool: &SqlitePool, workspace: &Workspace) -> Result<(), sqlx::Error> {
    let cases = serde_json::to_string(&workspace.cases)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        r#"
        INSERT INTO workspace (namespace, prompt, code, cases, api_key, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(namespace) DO UPDATE SET
            prompt = excluded.prompt,
            code = excluded.code,
            cases = excluded.cases,
            api_key = excluded.api_key,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(WORKSPACE_NAMESPACE)
    .bind(&workspace.prompt)
    .bind(&workspace.code)
    .bind(&cases)
    .bind(&workspace.api_key)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_workspace(pool: &SqlitePool) -> Result<Option<Workspace>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT prompt, code, cases, api_key
        FROM workspace
        WHERE namespace = ?
        "#,
    )
    .bind(WORKSPACE_NAMESPACE)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let cases: String = row.get(2);
    let cases = serde_json::from_str(&cases).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Some(Workspace {
        prompt: row.get(0),
        code: row.get(1),
        cases,
        api_key: row.get(3),
    }))
}
