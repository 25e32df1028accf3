//! SQLite-backed implementation of [`ToolRegistry`] and [`VectorStore`].
//!
//! Embeddings are stored as a little-endian f32 BLOB column, searched with a
//! brute-force cosine scan. In a real high-performance vector store we'd
//! want HNSW/IVF; this backend trades that for zero extra infrastructure.
//! Every mutation runs inside a single transaction, with the embedding (when
//! present) generated inside the same transaction that assigns the row id.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use toolgate_core::{
    ExecutionStatus, ImplementationType, NewTool, NewToolExecution, RegistryStats, Tool,
    ToolPatch,
};

use crate::error::StoreError;
use crate::traits::{ListFilter, ScoredTool, ToolRegistry, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    dimension: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect(),
    )
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Fingerprint of the fields discovery reconciliation diffs on: description,
/// input schema, tags, category. Stored alongside the row
/// so a sync run can detect "present and unchanged" without recomputing the
/// embedding text or re-reading the schema JSON.
pub fn content_hash(
    description: &str,
    input_schema: &serde_json::Value,
    category: &str,
    tags: &[String],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    hasher.update(input_schema.to_string().as_bytes());
    hasher.update(category.as_bytes());
    for tag in tags {
        hasher.update(tag.as_bytes());
    }
    hex::encode(hasher.finalize())
}

struct ToolRow {
    id: i64,
    name: String,
    description: String,
    category: String,
    tags: String,
    input_schema: String,
    output_schema: Option<String>,
    implementation_type: String,
    implementation_code: String,
    version: String,
    embedding: Option<Vec<u8>>,
    is_active: bool,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl ToolRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            tags: row.try_get("tags")?,
            input_schema: row.try_get("input_schema")?,
            output_schema: row.try_get("output_schema")?,
            implementation_type: row.try_get("implementation_type")?,
            implementation_code: row.try_get("implementation_code")?,
            version: row.try_get("version")?,
            embedding: row.try_get("embedding")?,
            is_active: row.try_get::<i64, _>("is_active")? != 0,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_tool(self) -> Result<Tool, StoreError> {
        Ok(Tool {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            tags: serde_json::from_str(&self.tags)?,
            input_schema: serde_json::from_str(&self.input_schema)?,
            output_schema: self
                .output_schema
                .map(|s| serde_json::from_str(&s))
                .transpose()?,
            implementation_type: ImplementationType::from_str(&self.implementation_type)
                .map_err(|e| StoreError::SchemaInvalid(e.to_string()))?,
            implementation_code: self.implementation_code,
            version: self.version,
            embedding: self.embedding.and_then(|b| decode_vector(&b)),
            is_active: self.is_active,
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: self
                .created_at
                .parse()
                .map_err(|_| StoreError::SchemaInvalid("bad created_at timestamp".into()))?,
            updated_at: self
                .updated_at
                .parse()
                .map_err(|_| StoreError::SchemaInvalid("bad updated_at timestamp".into()))?,
        })
    }
}

#[async_trait]
impl ToolRegistry for SqliteStore {
    async fn register(&self, new_tool: NewTool) -> Result<Tool, StoreError> {
        Tool::validate_name(&new_tool.name)?;
        Tool::validate_tags(&new_tool.tags)?;
        Tool::validate_schema(&new_tool.input_schema)?;
        if let Some(ref out) = new_tool.output_schema {
            Tool::validate_schema(out)?;
        }

        let mut tx = self.pool.begin().await?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM tools WHERE name = ?")
            .bind(&new_tool.name)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            return Err(StoreError::NameConflict(new_tool.name));
        }

        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(&new_tool.tags)?;
        let metadata_json = serde_json::to_string(&new_tool.metadata)?;
        let output_schema_json = new_tool
            .output_schema
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let rec = sqlx::query(
            "INSERT INTO tools (name, description, category, tags, input_schema, output_schema,
                implementation_type, implementation_code, version, is_active, metadata,
                content_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)",
        )
        .bind(&new_tool.name)
        .bind(&new_tool.description)
        .bind(&new_tool.category)
        .bind(&tags_json)
        .bind(serde_json::to_string(&new_tool.input_schema)?)
        .bind(&output_schema_json)
        .bind(new_tool.implementation_type.as_str())
        .bind(&new_tool.implementation_code)
        .bind(&new_tool.version)
        .bind(&metadata_json)
        .bind(content_hash(
            &new_tool.description,
            &new_tool.input_schema,
            &new_tool.category,
            &new_tool.tags,
        ))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let id = rec.last_insert_rowid();
        tx.commit().await?;

        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(new_tool.name))
    }

    async fn update(&self, id: i64, patch: ToolPatch) -> Result<Tool, StoreError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(ref schema) = patch.input_schema {
            Tool::validate_schema(schema)?;
        }
        if let Some(ref schema) = patch.output_schema {
            Tool::validate_schema(schema)?;
        }

        let name = patch.name.unwrap_or(existing.name);
        let description = patch.description.unwrap_or(existing.description);
        let category = patch.category.unwrap_or(existing.category);
        let tags = patch.tags.unwrap_or(existing.tags);
        Tool::validate_name(&name)?;
        Tool::validate_tags(&tags)?;

        let input_schema = patch.input_schema.unwrap_or(existing.input_schema);
        let output_schema = patch.output_schema.or(existing.output_schema);
        let implementation_type = patch
            .implementation_type
            .unwrap_or(existing.implementation_type);
        let implementation_code = patch
            .implementation_code
            .unwrap_or(existing.implementation_code);
        let version = patch.version.unwrap_or(existing.version);
        let metadata = patch.metadata.unwrap_or(existing.metadata);

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        if name != existing.name {
            let conflict: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM tools WHERE name = ? AND id != ?")
                    .bind(&name)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if conflict.is_some() {
                return Err(StoreError::NameConflict(name));
            }
        }

        sqlx::query(
            "UPDATE tools SET name=?, description=?, category=?, tags=?, input_schema=?,
                output_schema=?, implementation_type=?, implementation_code=?, version=?,
                metadata=?, content_hash=?, updated_at=? WHERE id=?",
        )
        .bind(&name)
        .bind(&description)
        .bind(&category)
        .bind(serde_json::to_string(&tags)?)
        .bind(serde_json::to_string(&input_schema)?)
        .bind(output_schema.as_ref().map(serde_json::to_string).transpose()?)
        .bind(implementation_type.as_str())
        .bind(&implementation_code)
        .bind(&version)
        .bind(serde_json::to_string(&metadata)?)
        .bind(content_hash(&description, &input_schema, &category, &tags))
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn deactivate(&self, id: i64) -> Result<Tool, StoreError> {
        set_active(&self.pool, id, false).await?;
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn activate(&self, id: i64) -> Result<Tool, StoreError> {
        set_active(&self.pool, id, true).await?;
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM tools WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<Tool>, StoreError> {
        let row = sqlx::query("SELECT * FROM tools WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| ToolRow::from_row(&r)?.into_tool()).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tool>, StoreError> {
        let row = sqlx::query("SELECT * FROM tools WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| ToolRow::from_row(&r)?.into_tool()).transpose()
    }

    async fn list(&self, filter: ListFilter) -> Result<(Vec<Tool>, i64), StoreError> {
        let limit = filter.limit.max(1);
        let offset = filter.offset.max(0);

        let (rows, total) = match &filter.category {
            Some(cat) if filter.active_only => {
                let rows = sqlx::query(
                    "SELECT * FROM tools WHERE category = ? AND is_active = 1
                     ORDER BY id ASC LIMIT ? OFFSET ?",
                )
                .bind(cat)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total: (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM tools WHERE category = ? AND is_active = 1",
                )
                .bind(cat)
                .fetch_one(&self.pool)
                .await?;
                (rows, total.0)
            }
            Some(cat) => {
                let rows = sqlx::query("SELECT * FROM tools WHERE category = ? ORDER BY id ASC LIMIT ? OFFSET ?")
                    .bind(cat)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?;
                let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools WHERE category = ?")
                    .bind(cat)
                    .fetch_one(&self.pool)
                    .await?;
                (rows, total.0)
            }
            None if filter.active_only => {
                let rows = sqlx::query(
                    "SELECT * FROM tools WHERE is_active = 1 ORDER BY id ASC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total: (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM tools WHERE is_active = 1")
                        .fetch_one(&self.pool)
                        .await?;
                (rows, total.0)
            }
            None => {
                let rows = sqlx::query("SELECT * FROM tools ORDER BY id ASC LIMIT ? OFFSET ?")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?;
                let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools")
                    .fetch_one(&self.pool)
                    .await?;
                (rows, total.0)
            }
        };

        let tools = rows
            .iter()
            .map(|r| ToolRow::from_row(r)?.into_tool())
            .collect::<Result<Vec<_>, _>>()?;
        Ok((tools, total))
    }

    async fn reindex(&self, id: i64) -> Result<(), StoreError> {
        // Embedding regeneration itself is orchestrated by the caller (the
        // registry has no embedding client); this just clears the stale
        // vector so a subsequent `set_embedding` replaces it atomically.
        sqlx::query("UPDATE tools SET embedding = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_execution(&self, execution: NewToolExecution) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO tool_executions (tool_id, tool_name, arguments, output, status,
                error_message, duration_ms, started_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(execution.tool_id)
        .bind(&execution.tool_name)
        .bind(serde_json::to_string(&execution.arguments)?)
        .bind(execution.output.as_ref().map(serde_json::to_string).transpose()?)
        .bind(status_str(execution.status))
        .bind(&execution.error_message)
        .bind(execution.duration_ms)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self) -> Result<RegistryStats, StoreError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools")
            .fetch_one(&self.pool)
            .await?;
        let active: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        let by_category_rows =
            sqlx::query("SELECT category, COUNT(*) as c FROM tools GROUP BY category")
                .fetch_all(&self.pool)
                .await?;
        let mut by_category = BTreeMap::new();
        for row in by_category_rows {
            let cat: String = row.try_get("category")?;
            let c: i64 = row.try_get("c")?;
            by_category.insert(cat, c);
        }

        let by_type_rows = sqlx::query(
            "SELECT implementation_type, COUNT(*) as c FROM tools GROUP BY implementation_type",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut by_implementation_type = BTreeMap::new();
        for row in by_type_rows {
            let t: String = row.try_get("implementation_type")?;
            let c: i64 = row.try_get("c")?;
            by_implementation_type.insert(t, c);
        }

        Ok(RegistryStats {
            total: total.0,
            active: active.0,
            by_category,
            by_implementation_type,
        })
    }

    async fn active_names(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT name FROM tools WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(StoreError::from))
            .collect()
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE tools SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(active as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    tx.commit().await?;
    Ok(())
}

fn status_str(status: ExecutionStatus) -> &'static str {
    status.as_str()
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn set_embedding(&self, tool_id: i64, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE tools SET embedding = ?, updated_at = ? WHERE id = ?")
            .bind(encode_vector(vector))
            .bind(Utc::now().to_rfc3339())
            .bind(tool_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(tool_id.to_string()));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn semantic_search(
        &self,
        query_vec: &[f32],
        limit: i64,
        min_similarity: f32,
        category: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ScoredTool>, StoreError> {
        if query_vec.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: query_vec.len(),
            });
        }

        let rows = sqlx::query("SELECT * FROM tools WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        let mut scored = Vec::new();
        for row in rows {
            let tool = ToolRow::from_row(&row)?.into_tool()?;
            if active_only && !tool.is_active {
                continue;
            }
            if let Some(cat) = category {
                if tool.category != cat {
                    continue;
                }
            }
            let Some(ref vector) = tool.embedding else {
                continue;
            };
            let score = cosine_similarity(query_vec, vector);
            if score < min_similarity {
                continue;
            }
            scored.push(ScoredTool { tool, score });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.tool.id.cmp(&b.tool.id))
        });
        scored.truncate(limit.max(0) as usize);
        Ok(scored)
    }

    async fn lexical_search(
        &self,
        query_text: &str,
        limit: i64,
        category: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ScoredTool>, StoreError> {
        let sanitized = sanitize_fts_query(query_text);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT tools.*, bm25(tools_fts) AS rank FROM tools_fts
             JOIN tools ON tools.id = tools_fts.rowid
             WHERE tools_fts MATCH ?
             ORDER BY rank LIMIT ?",
        )
        .bind(&sanitized)
        .bind((limit.max(1) * 4).max(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut raw = Vec::new();
        let mut max_rank = f64::MIN;
        let mut min_rank = f64::MAX;
        for row in &rows {
            let rank: f64 = row.try_get("rank")?;
            max_rank = max_rank.max(rank);
            min_rank = min_rank.min(rank);
            raw.push((rank, row));
        }

        let mut scored = Vec::new();
        for (rank, row) in raw {
            let tool = ToolRow::from_row(row)?.into_tool()?;
            if active_only && !tool.is_active {
                continue;
            }
            if let Some(cat) = category {
                if tool.category != cat {
                    continue;
                }
            }
            // bm25() in sqlite returns lower-is-better; normalize and invert
            // into a [0,1] "higher is better" rank.
            let normalized = if (max_rank - min_rank).abs() < f64::EPSILON {
                1.0
            } else {
                1.0 - ((rank - min_rank) / (max_rank - min_rank))
            };
            scored.push(ScoredTool {
                tool,
                score: normalized.clamp(0.0, 1.0) as f32,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.tool.id.cmp(&b.tool.id))
        });
        scored.truncate(limit.max(0) as usize);
        Ok(scored)
    }

    async fn hybrid_search(
        &self,
        query_text: &str,
        query_vec: &[f32],
        limit: i64,
        alpha: f32,
        min_similarity: f32,
        category: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ScoredTool>, StoreError> {
        let k = (limit.max(1) * 3).max(limit);
        let semantic = self
            .semantic_search(query_vec, k, min_similarity, category, active_only)
            .await?;
        let lexical = self
            .lexical_search(query_text, k, category, active_only)
            .await?;

        let mut semantic_scores = BTreeMap::new();
        for hit in &semantic {
            semantic_scores.insert(hit.tool.id, hit.score);
        }
        let mut lexical_scores = BTreeMap::new();
        for hit in &lexical {
            lexical_scores.insert(hit.tool.id, hit.score);
        }

        let mut by_id: BTreeMap<i64, Tool> = BTreeMap::new();
        for hit in semantic.into_iter().chain(lexical.into_iter()) {
            by_id.entry(hit.tool.id).or_insert(hit.tool);
        }

        let mut blended: Vec<ScoredTool> = by_id
            .into_iter()
            .filter_map(|(id, tool)| {
                // Hybrid still filters on the semantic component alone, not
                // the blended score.
                let semantic_score = *semantic_scores.get(&id)?;
                if semantic_score < min_similarity {
                    return None;
                }
                let lexical_score = lexical_scores.get(&id).copied().unwrap_or(0.0);
                let blended_score = alpha * semantic_score + (1.0 - alpha) * lexical_score;
                Some(ScoredTool {
                    tool,
                    score: blended_score.clamp(0.0, 1.0),
                })
            })
            .collect();

        blended.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.tool.id.cmp(&b.tool.id))
        });
        blended.truncate(limit.max(0) as usize);
        Ok(blended)
    }

    async fn find_similar(
        &self,
        tool_id: i64,
        limit: i64,
        exclude_self: bool,
    ) -> Result<Vec<ScoredTool>, StoreError> {
        let Some(tool) = self.get(tool_id).await? else {
            return Err(StoreError::NotFound(tool_id.to_string()));
        };
        let Some(vector) = tool.embedding else {
            return Ok(Vec::new());
        };
        let k = if exclude_self { limit + 1 } else { limit };
        let mut hits = self.semantic_search(&vector, k, 0.0, None, true).await?;
        if exclude_self {
            hits.retain(|h| h.tool.id != tool_id);
        }
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn count_indexed(&self, active_only: bool) -> Result<i64, StoreError> {
        let row: (i64,) = if active_only {
            sqlx::query_as(
                "SELECT COUNT(*) FROM tools WHERE embedding IS NOT NULL AND is_active = 1",
            )
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM tools WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await?
        };
        Ok(row.0)
    }

    async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT category FROM tools ORDER BY category")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("category").map_err(StoreError::from))
            .collect()
    }

    async fn has_any_embeddings(&self) -> Result<bool, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools WHERE embedding IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 > 0)
    }
}

/// FTS5 query strings are built from user input; strip the characters that
/// carry FTS5 query-syntax meaning so a `find_tool` query can never be used
/// to inject operators, then quote each remaining token as a phrase.
fn sanitize_fts_query(input: &str) -> String {
    input
        .split_whitespace()
        .map(|tok| {
            let cleaned: String = tok
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            cleaned
        })
        .filter(|tok| !tok.is_empty())
        .map(|tok| format!("\"{tok}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{connect, PoolConfig};
    use toolgate_core::ImplementationType;

    async fn test_store() -> SqliteStore {
        let config = PoolConfig::memory(4);
        let pool = connect(&config).await.unwrap();
        SqliteStore::new(pool, 4)
    }

    fn sample_tool(name: &str) -> NewTool {
        NewTool {
            name: name.to_string(),
            description: "adds two numbers".to_string(),
            category: "math".to_string(),
            tags: vec!["add".to_string(), "math".to_string()],
            input_schema: serde_json::json!({"type": "object"}),
            output_schema: None,
            implementation_type: ImplementationType::PythonCallable,
            implementation_code: "calc.add".to_string(),
            version: "1.0.0".to_string(),
            metadata: serde_json::json!({}),
            auto_embed: true,
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicate_names() {
        let store = test_store().await;
        store.register(sample_tool("calculator")).await.unwrap();
        let err = store.register(sample_tool("calculator")).await.unwrap_err();
        assert!(matches!(err, StoreError::NameConflict(_)));
    }

    #[tokio::test]
    async fn set_embedding_validates_dimension() {
        let store = test_store().await;
        let tool = store.register(sample_tool("calculator")).await.unwrap();
        let err = store.set_embedding(tool.id, &[1.0, 2.0]).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
        store
            .set_embedding(tool.id, &[1.0, 0.0, 0.0, 0.0])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn semantic_search_scores_are_bounded_and_sorted() {
        let store = test_store().await;
        let t1 = store.register(sample_tool("calculator")).await.unwrap();
        let t2 = store.register(sample_tool("weather")).await.unwrap();
        store
            .set_embedding(t1.id, &[1.0, 0.0, 0.0, 0.0])
            .await
            .unwrap();
        store
            .set_embedding(t2.id, &[0.0, 1.0, 0.0, 0.0])
            .await
            .unwrap();

        let hits = store
            .semantic_search(&[1.0, 0.0, 0.0, 0.0], 10, 0.0, None, true)
            .await
            .unwrap();
        assert_eq!(hits[0].tool.name, "calculator");
        for w in hits.windows(2) {
            assert!(w[0].score >= w[1].score);
        }
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.score));
        }
    }

    #[tokio::test]
    async fn deactivated_tool_excluded_from_active_list() {
        let store = test_store().await;
        let tool = store.register(sample_tool("calculator")).await.unwrap();
        store.deactivate(tool.id).await.unwrap();
        let (tools, total) = store
            .list(ListFilter {
                active_only: true,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 0);
        assert!(tools.is_empty());
    }
}
