//! Postgres + pgvector backend, selected behind the `postgres` feature for
//! deployments that need a true ANN index instead of the SQLite backend's
//! brute-force scan. Mirrors [`crate::sqlite_store::SqliteStore`]'s CRUD and
//! search surface; see `migrations_postgres/` for the pgvector-specific
//! schema (vector column + `ivfflat` index + `tsvector` lexical column).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{PgPool, Row};
use toolgate_core::{
    ExecutionStatus, ImplementationType, NewTool, NewToolExecution, RegistryStats, Tool,
    ToolPatch,
};

use crate::error::StoreError;
use crate::sqlite_store::content_hash;
use crate::traits::{ListFilter, ScoredTool, ToolRegistry, VectorStore};

pub struct PostgresStore {
    pool: PgPool,
    dimension: usize,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, dimension: usize) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(StoreError::Database)?;
        sqlx::migrate!("./migrations_postgres").run(&pool).await?;
        enforce_embedding_dimension(&pool, dimension).await?;
        Ok(Self { pool, dimension })
    }

    fn row_to_tool(row: &sqlx::postgres::PgRow) -> Result<Tool, StoreError> {
        let tags_json: String = row.try_get("tags")?;
        let input_schema_json: String = row.try_get("input_schema")?;
        let output_schema_json: Option<String> = row.try_get("output_schema")?;
        let metadata_json: String = row.try_get("metadata")?;
        let implementation_type: String = row.try_get("implementation_type")?;
        let embedding: Option<Vector> = row.try_get("embedding")?;

        Ok(Tool {
            id: row.try_get::<i64, _>("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            tags: serde_json::from_str(&tags_json)?,
            input_schema: serde_json::from_str(&input_schema_json)?,
            output_schema: output_schema_json
                .map(|s| serde_json::from_str(&s))
                .transpose()?,
            implementation_type: implementation_type
                .parse()
                .map_err(|e: toolgate_core::CoreError| StoreError::SchemaInvalid(e.to_string()))?,
            implementation_code: row.try_get("implementation_code")?,
            version: row.try_get("version")?,
            embedding: embedding.map(|v| v.to_vec()),
            is_active: row.try_get("is_active")?,
            metadata: serde_json::from_str(&metadata_json)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ToolRegistry for PostgresStore {
    async fn register(&self, new_tool: NewTool) -> Result<Tool, StoreError> {
        Tool::validate_name(&new_tool.name)?;
        Tool::validate_tags(&new_tool.tags)?;
        Tool::validate_schema(&new_tool.input_schema)?;

        let mut tx = self.pool.begin().await?;
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM tools WHERE name = $1")
            .bind(&new_tool.name)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(StoreError::NameConflict(new_tool.name));
        }

        let now = Utc::now();
        let id: (i64,) = sqlx::query_as(
            "INSERT INTO tools (name, description, category, tags, input_schema, output_schema,
                implementation_type, implementation_code, version, is_active, metadata,
                content_hash, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,true,$10,$11,$12,$12) RETURNING id",
        )
        .bind(&new_tool.name)
        .bind(&new_tool.description)
        .bind(&new_tool.category)
        .bind(serde_json::to_string(&new_tool.tags)?)
        .bind(serde_json::to_string(&new_tool.input_schema)?)
        .bind(new_tool.output_schema.as_ref().map(serde_json::to_string).transpose()?)
        .bind(new_tool.implementation_type.as_str())
        .bind(&new_tool.implementation_code)
        .bind(&new_tool.version)
        .bind(serde_json::to_string(&new_tool.metadata)?)
        .bind(content_hash(
            &new_tool.description,
            &new_tool.input_schema,
            &new_tool.category,
            &new_tool.tags,
        ))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        self.get(id.0)
            .await?
            .ok_or_else(|| StoreError::NotFound(new_tool.name))
    }

    async fn update(&self, id: i64, patch: ToolPatch) -> Result<Tool, StoreError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let name = patch.name.unwrap_or(existing.name);
        let description = patch.description.unwrap_or(existing.description);
        let category = patch.category.unwrap_or(existing.category);
        let tags = patch.tags.unwrap_or(existing.tags);
        Tool::validate_name(&name)?;
        Tool::validate_tags(&tags)?;
        let input_schema = patch.input_schema.unwrap_or(existing.input_schema);
        let output_schema = patch.output_schema.or(existing.output_schema);
        let implementation_type = patch.implementation_type.unwrap_or(existing.implementation_type);
        let implementation_code = patch.implementation_code.unwrap_or(existing.implementation_code);
        let version = patch.version.unwrap_or(existing.version);
        let metadata = patch.metadata.unwrap_or(existing.metadata);

        sqlx::query(
            "UPDATE tools SET name=$1, description=$2, category=$3, tags=$4, input_schema=$5,
                output_schema=$6, implementation_type=$7, implementation_code=$8, version=$9,
                metadata=$10, content_hash=$11, updated_at=$12 WHERE id=$13",
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
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn deactivate(&self, id: i64) -> Result<Tool, StoreError> {
        sqlx::query("UPDATE tools SET is_active = false, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.get(id).await?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn activate(&self, id: i64) -> Result<Tool, StoreError> {
        sqlx::query("UPDATE tools SET is_active = true, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.get(id).await?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tools WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<Tool>, StoreError> {
        let row = sqlx::query("SELECT * FROM tools WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_tool).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tool>, StoreError> {
        let row = sqlx::query("SELECT * FROM tools WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_tool).transpose()
    }

    async fn list(&self, filter: ListFilter) -> Result<(Vec<Tool>, i64), StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM tools
             WHERE ($1::text IS NULL OR category = $1)
               AND (NOT $2 OR is_active)
             ORDER BY id ASC LIMIT $3 OFFSET $4",
        )
        .bind(&filter.category)
        .bind(filter.active_only)
        .bind(filter.limit.max(1))
        .bind(filter.offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tools WHERE ($1::text IS NULL OR category = $1) AND (NOT $2 OR is_active)",
        )
        .bind(&filter.category)
        .bind(filter.active_only)
        .fetch_one(&self.pool)
        .await?;
        let tools = rows.iter().map(Self::row_to_tool).collect::<Result<Vec<_>, _>>()?;
        Ok((tools, total.0))
    }

    async fn reindex(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE tools SET embedding = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_execution(&self, execution: NewToolExecution) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tool_executions (tool_id, tool_name, arguments, output, status,
                error_message, duration_ms, started_at) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(execution.tool_id)
        .bind(&execution.tool_name)
        .bind(serde_json::to_string(&execution.arguments)?)
        .bind(execution.output.as_ref().map(serde_json::to_string).transpose()?)
        .bind(status_str(execution.status))
        .bind(&execution.error_message)
        .bind(execution.duration_ms)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<RegistryStats, StoreError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools").fetch_one(&self.pool).await?;
        let active: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        let by_category_rows = sqlx::query("SELECT category, COUNT(*) as c FROM tools GROUP BY category")
            .fetch_all(&self.pool)
            .await?;
        let mut by_category = BTreeMap::new();
        for row in by_category_rows {
            by_category.insert(row.try_get::<String, _>("category")?, row.try_get::<i64, _>("c")?);
        }
        let by_type_rows =
            sqlx::query("SELECT implementation_type, COUNT(*) as c FROM tools GROUP BY implementation_type")
                .fetch_all(&self.pool)
                .await?;
        let mut by_implementation_type = BTreeMap::new();
        for row in by_type_rows {
            by_implementation_type
                .insert(row.try_get::<String, _>("implementation_type")?, row.try_get::<i64, _>("c")?);
        }
        Ok(RegistryStats { total: total.0, active: active.0, by_category, by_implementation_type })
    }

    async fn active_names(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT name FROM tools WHERE is_active").fetch_all(&self.pool).await?;
        rows.iter().map(|r| r.try_get::<String, _>("name").map_err(StoreError::from)).collect()
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

fn status_str(status: ExecutionStatus) -> &'static str {
    status.as_str()
}

/// Mirrors `pool::enforce_embedding_dimension`'s SQLite check: a redeploy
/// against an existing database with a different dimension fails loudly at
/// connect time rather than corrupting vector search silently.
async fn enforce_embedding_dimension(pool: &PgPool, dimension: usize) -> Result<(), StoreError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT embedding_dimension FROM registry_config WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    match row {
        Some((stored,)) if stored as usize != dimension => Err(StoreError::DimensionMismatch {
            expected: stored as usize,
            got: dimension,
        }),
        Some(_) => Ok(()),
        None => {
            sqlx::query("INSERT INTO registry_config (id, embedding_dimension) VALUES (1, $1)")
                .bind(dimension as i64)
                .execute(pool)
                .await?;
            Ok(())
        }
    }
}

#[async_trait]
impl VectorStore for PostgresStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn set_embedding(&self, tool_id: i64, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch { expected: self.dimension, got: vector.len() });
        }
        let result = sqlx::query("UPDATE tools SET embedding = $1, updated_at = $2 WHERE id = $3")
            .bind(Vector::from(vector.to_vec()))
            .bind(Utc::now())
            .bind(tool_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(tool_id.to_string()));
        }
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
            return Err(StoreError::DimensionMismatch { expected: self.dimension, got: query_vec.len() });
        }
        let vector = Vector::from(query_vec.to_vec());
        let rows = sqlx::query(
            "SELECT *, 1 - (embedding <=> $1) AS similarity FROM tools
             WHERE embedding IS NOT NULL
               AND ($2::text IS NULL OR category = $2)
               AND (NOT $3 OR is_active)
               AND 1 - (embedding <=> $1) >= $4
             ORDER BY similarity DESC, id ASC LIMIT $5",
        )
        .bind(&vector)
        .bind(category)
        .bind(active_only)
        .bind(min_similarity)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let similarity: f64 = row.try_get("similarity")?;
                Ok(ScoredTool {
                    tool: Self::row_to_tool(row)?,
                    score: (similarity as f32).clamp(0.0, 1.0),
                })
            })
            .collect()
    }

    async fn lexical_search(
        &self,
        query_text: &str,
        limit: i64,
        category: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ScoredTool>, StoreError> {
        let rows = sqlx::query(
            "SELECT *, ts_rank(search_vector, plainto_tsquery('english', $1)) AS rank FROM tools
             WHERE search_vector @@ plainto_tsquery('english', $1)
               AND ($2::text IS NULL OR category = $2)
               AND (NOT $3 OR is_active)
             ORDER BY rank DESC, id ASC LIMIT $4",
        )
        .bind(query_text)
        .bind(category)
        .bind(active_only)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let rank: f64 = row.try_get("rank")?;
                Ok(ScoredTool { tool: Self::row_to_tool(row)?, score: (rank as f32).clamp(0.0, 1.0) })
            })
            .collect()
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
        let semantic = self.semantic_search(query_vec, k, min_similarity, category, active_only).await?;
        let lexical = self.lexical_search(query_text, k, category, active_only).await?;

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
                let semantic_score = *semantic_scores.get(&id)?;
                if semantic_score < min_similarity {
                    return None;
                }
                let lexical_score = lexical_scores.get(&id).copied().unwrap_or(0.0);
                let blended_score = alpha * semantic_score + (1.0 - alpha) * lexical_score;
                Some(ScoredTool { tool, score: blended_score.clamp(0.0, 1.0) })
            })
            .collect();
        blended.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.tool.id.cmp(&b.tool.id))
        });
        blended.truncate(limit.max(0) as usize);
        Ok(blended)
    }

    async fn find_similar(&self, tool_id: i64, limit: i64, exclude_self: bool) -> Result<Vec<ScoredTool>, StoreError> {
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
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tools WHERE embedding IS NOT NULL AND (NOT $1 OR is_active)",
        )
        .bind(active_only)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT category FROM tools ORDER BY category")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| r.try_get::<String, _>("category").map_err(StoreError::from)).collect()
    }

    async fn has_any_embeddings(&self) -> Result<bool, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools WHERE embedding IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 > 0)
    }
}
