use serde_json::Value;
use tokio_postgres::{Client, GenericClient};
use uuid::Uuid;

use crate::models::{ContentSummary, ProjectResponse};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT UNIQUE NOT NULL,
    name TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE TABLE IF NOT EXISTS projects (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    user_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE TABLE IF NOT EXISTS contents (
    id UUID PRIMARY KEY,
    title TEXT NOT NULL,
    type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    user_id TEXT NOT NULL,
    project_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE TABLE IF NOT EXISTS generations (
    id UUID PRIMARY KEY,
    type TEXT NOT NULL,
    prompt TEXT NOT NULL,
    result TEXT NOT NULL,
    metadata JSONB NOT NULL,
    cost DOUBLE PRECISION NOT NULL,
    content_id UUID NOT NULL REFERENCES contents(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_contents_user_created ON contents (user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_generations_content ON generations (content_id, created_at DESC);
";

const SQL_UPSERT_USER: &str = "INSERT INTO users (id, email, name) VALUES ($1, $2, $3) \
ON CONFLICT (email) DO UPDATE SET name = COALESCE(EXCLUDED.name, users.name)";
const SQL_INSERT_CONTENT: &str =
    "INSERT INTO contents (id, title, type, status, user_id, project_id) \
VALUES ($1, $2, $3, 'draft', $4, $5)";
const SQL_CONTENT_OWNED: &str = "SELECT 1 FROM contents WHERE id = $1 AND user_id = $2";
const SQL_INSERT_GENERATION: &str =
    "INSERT INTO generations (id, type, prompt, result, metadata, cost, content_id) \
VALUES ($1, $2, $3, $4, $5, $6, $7)";
const SQL_GENERATION_METADATA: &str = "SELECT metadata FROM generations WHERE id = $1";
const SQL_UPDATE_GENERATION_RESULT: &str =
    "UPDATE generations SET result = $1, metadata = $2 WHERE id = $3";
const SQL_LIST_PROJECTS: &str = "SELECT id, name, description, created_at::text AS created_at \
FROM projects WHERE user_id = $1 ORDER BY created_at DESC";
const SQL_INSERT_PROJECT: &str =
    "INSERT INTO projects (id, name, description, user_id) VALUES ($1, $2, $3, $4) \
RETURNING id, name, description, created_at::text AS created_at";
const SQL_LIBRARY: &str = "SELECT c.id, c.title, c.type, c.status, \
c.created_at::text AS created_at, COUNT(g.id) AS generations_count \
FROM contents c LEFT JOIN generations g ON g.content_id = c.id \
WHERE c.user_id = $1 \
GROUP BY c.id, c.title, c.type, c.status, c.created_at \
ORDER BY c.created_at DESC LIMIT $2";
const SQL_COUNT_CONTENTS: &str = "SELECT COUNT(*) FROM contents WHERE user_id = $1";
const SQL_COUNT_PROJECTS: &str = "SELECT COUNT(*) FROM projects WHERE user_id = $1";
const SQL_SUM_TOKENS: &str = "SELECT COALESCE(SUM((g.metadata->>'tokens_used')::bigint), 0) \
FROM generations g JOIN contents c ON c.id = g.content_id \
WHERE c.user_id = $1 AND g.type = 'TEXT'";

pub async fn ensure_schema(db: &Client) -> Result<(), String> {
    db.batch_execute(SCHEMA_SQL)
        .await
        .map_err(|err| format!("ensure schema failed: {err}"))
}

pub async fn upsert_user(
    db: &impl GenericClient,
    id: &str,
    email: &str,
    name: Option<&str>,
) -> Result<(), tokio_postgres::Error> {
    db.execute(SQL_UPSERT_USER, &[&id, &email, &name]).await?;
    Ok(())
}

pub async fn insert_content(
    db: &impl GenericClient,
    id: &Uuid,
    title: &str,
    content_type: &str,
    user_id: &str,
    project_id: &Option<Uuid>,
) -> Result<(), String> {
    db.execute(
        SQL_INSERT_CONTENT,
        &[id, &title, &content_type, &user_id, project_id],
    )
    .await
    .map_err(|err| format!("insert content failed: {err}"))?;
    Ok(())
}

/// Tenant isolation check: the content must exist and belong to the caller.
pub async fn content_owned_by(
    db: &impl GenericClient,
    content_id: &Uuid,
    user_id: &str,
) -> Result<bool, String> {
    let row = db
        .query_opt(SQL_CONTENT_OWNED, &[content_id, &user_id])
        .await
        .map_err(|err| format!("content lookup failed: {err}"))?;
    Ok(row.is_some())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_generation(
    db: &impl GenericClient,
    id: &Uuid,
    kind: &str,
    prompt: &str,
    result: &str,
    metadata: &Value,
    cost: f64,
    content_id: &Uuid,
) -> Result<(), String> {
    db.execute(
        SQL_INSERT_GENERATION,
        &[id, &kind, &prompt, &result, metadata, &cost, content_id],
    )
    .await
    .map_err(|err| format!("insert generation failed: {err}"))?;
    Ok(())
}

pub async fn generation_metadata(
    db: &impl GenericClient,
    id: &Uuid,
) -> Result<Option<Value>, String> {
    let row = db
        .query_opt(SQL_GENERATION_METADATA, &[id])
        .await
        .map_err(|err| format!("generation lookup failed: {err}"))?;
    Ok(row.map(|row| row.get("metadata")))
}

pub async fn update_generation_result(
    db: &impl GenericClient,
    id: &Uuid,
    result: &str,
    metadata: &Value,
) -> Result<(), String> {
    db.execute(SQL_UPDATE_GENERATION_RESULT, &[&result, metadata, id])
        .await
        .map_err(|err| format!("update generation failed: {err}"))?;
    Ok(())
}

pub async fn list_projects(
    db: &impl GenericClient,
    user_id: &str,
) -> Result<Vec<ProjectResponse>, String> {
    let rows = db
        .query(SQL_LIST_PROJECTS, &[&user_id])
        .await
        .map_err(|err| format!("list projects failed: {err}"))?;
    Ok(rows
        .into_iter()
        .map(|row| ProjectResponse {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn insert_project(
    db: &impl GenericClient,
    id: &Uuid,
    name: &str,
    description: &Option<String>,
    user_id: &str,
) -> Result<ProjectResponse, String> {
    let row = db
        .query_one(SQL_INSERT_PROJECT, &[id, &name, description, &user_id])
        .await
        .map_err(|err| format!("insert project failed: {err}"))?;
    Ok(ProjectResponse {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    })
}

pub async fn library_contents(
    db: &impl GenericClient,
    user_id: &str,
    limit: i64,
) -> Result<Vec<ContentSummary>, String> {
    let rows = db
        .query(SQL_LIBRARY, &[&user_id, &limit])
        .await
        .map_err(|err| format!("library query failed: {err}"))?;
    Ok(rows
        .into_iter()
        .map(|row| ContentSummary {
            id: row.get("id"),
            title: row.get("title"),
            content_type: row.get("type"),
            status: row.get("status"),
            created_at: row.get("created_at"),
            generations_count: row.get("generations_count"),
        })
        .collect())
}

pub async fn count_contents(db: &impl GenericClient, user_id: &str) -> Result<i64, String> {
    let row = db
        .query_one(SQL_COUNT_CONTENTS, &[&user_id])
        .await
        .map_err(|err| format!("content count failed: {err}"))?;
    Ok(row.get(0))
}

pub async fn count_projects(db: &impl GenericClient, user_id: &str) -> Result<i64, String> {
    let row = db
        .query_one(SQL_COUNT_PROJECTS, &[&user_id])
        .await
        .map_err(|err| format!("project count failed: {err}"))?;
    Ok(row.get(0))
}

pub async fn sum_text_tokens(db: &impl GenericClient, user_id: &str) -> Result<i64, String> {
    let row = db
        .query_one(SQL_SUM_TOKENS, &[&user_id])
        .await
        .map_err(|err| format!("token sum failed: {err}"))?;
    Ok(row.get(0))
}
