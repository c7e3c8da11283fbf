//! PostgreSQL task store backend.
//!
//! The reference durable backend: one logical `tasks` table, the CAS
//! predicate of §4.1 realized as a guarded `UPDATE ... WHERE ... RETURNING
//! *`, and the subtype payload flattened into a `task_type` column plus a
//! `data` JSONB column. Suitable for multiple executor processes sharing one
//! database as the single source of truth.

use std::time::Duration;

use async_trait::async_trait;
use decapod_task_core::{
    ExecutorStamp, TaskData, TaskId, TaskRecord, TaskType, TimeFields, Transition,
    TransitionForbidden, new_bounce_time, new_update_marker, state_machine,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{PgPool, Row};

use crate::error::StoreError;
use crate::traits::TaskStore;

/// Configuration for the PostgreSQL backend, matching `db.*` in the crate's
/// configuration surface.
#[derive(Debug, Clone)]
pub struct PostgresStoreConfig {
    /// `db.uri`.
    pub database_url: String,
    /// `db.pool_size`.
    pub pool_size: u32,
    /// `db.connect`: eager (connect now, fail fast) vs lazy (first use).
    pub eager_connect: bool,
    /// `db.connect_timeout`, milliseconds.
    pub connect_timeout_ms: u64,
    /// `db.socket_timeout`, milliseconds — applied as Postgres
    /// `statement_timeout` since `sqlx`'s pool has no separate socket-level
    /// read timeout knob.
    pub socket_timeout_ms: u64,
    /// `db.tls_verify` — defaults to `true`. The legacy behavior (disable
    /// verification whenever the URI carries `ssl=true`) is a deliberate
    /// deviation recorded in DESIGN.md; this crate requires an explicit
    /// opt-out instead.
    pub tls_verify: bool,
    /// `cron.clean_finished_tasks_after_seconds`.
    pub ttl_seconds: i64,
    /// Create the table and indexes if they don't already exist.
    pub create_schema_if_missing: bool,
}

impl Default for PostgresStoreConfig {
    fn default() -> Self {
        PostgresStoreConfig {
            database_url: "postgres://localhost:5432/decapod_tasks".to_string(),
            pool_size: 10,
            eager_connect: true,
            connect_timeout_ms: 5_000,
            socket_timeout_ms: 30_000,
            tls_verify: true,
            ttl_seconds: 86_400,
            create_schema_if_missing: true,
        }
    }
}

/// PostgreSQL-backed [`TaskStore`].
pub struct PostgresTaskStore {
    pool: PgPool,
    config: PostgresStoreConfig,
}

impl PostgresTaskStore {
    /// Connect and (if configured) create the schema.
    pub async fn connect(config: PostgresStoreConfig) -> Result<Self, StoreError> {
        tracing::info!(
            database = %mask_db_url(&config.database_url),
            pool_size = config.pool_size,
            tls_verify = config.tls_verify,
            "connecting to postgres task store"
        );

        let mut opts: PgConnectOptions = config
            .database_url
            .parse()
            .map_err(|e: sqlx::Error| StoreError::Database(e.to_string()))?;

        if config.database_url.contains("ssl=true") {
            opts = opts.ssl_mode(if config.tls_verify {
                PgSslMode::VerifyFull
            } else {
                PgSslMode::Require
            });
        }
        opts = opts.options([("statement_timeout", config.socket_timeout_ms.to_string())]);

        let pool_options = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms));

        let pool = if config.eager_connect {
            pool_options.connect_with(opts).await?
        } else {
            pool_options.connect_lazy_with(opts)
        };

        let store = PostgresTaskStore { pool, config };
        if store.config.create_schema_if_missing {
            store.ensure_schema().await?;
        }
        Ok(store)
    }

    /// Build a store around an already-configured pool (e.g. one shared with
    /// other collaborators in the host process).
    pub fn with_pool(pool: PgPool, config: PostgresStoreConfig) -> Self {
        PostgresTaskStore { pool, config }
    }
}

fn mask_db_url(url: &str) -> String {
    if let Some(at) = url.find('@') {
        let (prefix, suffix) = url.split_at(at);
        if let Some(colon) = prefix.rfind(':') {
            return format!("{}:***{}", &prefix[..colon], suffix);
        }
    }
    url.to_string()
}

fn split_task_data(data: &TaskData) -> Result<(&'static str, serde_json::Value), StoreError> {
    let task_type = match data {
        TaskData::Playbook(_) => TaskType::Playbook.as_str(),
        TaskData::Cancel(_) => TaskType::Cancel.as_str(),
        TaskData::ServerDiscovery(_) => TaskType::ServerDiscovery.as_str(),
    };
    let tagged = serde_json::to_value(data)?;
    let payload = tagged
        .get("data")
        .cloned()
        .unwrap_or(serde_json::Value::Object(Default::default()));
    Ok((task_type, payload))
}

fn parse_task_data(task_type: &str, payload: serde_json::Value) -> Result<TaskData, StoreError> {
    let tagged = serde_json::json!({ "task_type": task_type, "data": payload });
    Ok(serde_json::from_value(tagged)?)
}

fn row_to_record(row: &PgRow) -> Result<TaskRecord, StoreError> {
    let id_str: String = row.get("id");
    let id = TaskId::try_from(id_str.clone()).map_err(|_| StoreError::Database(format!("malformed task id {id_str}")))?;

    let task_type: String = row.get("task_type");
    let payload: serde_json::Value = row.get("data");
    let data = parse_task_data(&task_type, payload)?;

    let bounced: i32 = row.get("bounced");
    let executor_pid: i64 = row.get("executor_pid");

    Ok(TaskRecord {
        id,
        execution_id: row.get("execution_id"),
        time: TimeFields {
            created: row.get("time_created"),
            updated: row.get("time_updated"),
            started: row.get("time_started"),
            completed: row.get("time_completed"),
            cancelled: row.get("time_cancelled"),
            failed: row.get("time_failed"),
            bounced: row.get("time_bounced"),
        },
        bounced: bounced as u32,
        update_marker: row.get("update_marker"),
        executor: ExecutorStamp {
            host: row.get("executor_host"),
            pid: executor_pid,
        },
        error: row.get("error"),
        data,
        remove_at: row.get("remove_at"),
    })
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                execution_id TEXT NOT NULL,
                task_type TEXT NOT NULL,
                time_created BIGINT NOT NULL,
                time_updated BIGINT NOT NULL,
                time_started BIGINT NOT NULL DEFAULT 0,
                time_completed BIGINT NOT NULL DEFAULT 0,
                time_cancelled BIGINT NOT NULL DEFAULT 0,
                time_failed BIGINT NOT NULL DEFAULT 0,
                time_bounced BIGINT NOT NULL DEFAULT 0,
                bounced INTEGER NOT NULL DEFAULT 0,
                update_marker TEXT NOT NULL,
                executor_host TEXT NOT NULL DEFAULT '',
                executor_pid BIGINT NOT NULL DEFAULT 0,
                error TEXT,
                data JSONB NOT NULL,
                remove_at BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Invariant 3: unique (execution_id, task_type).
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_execution_type ON tasks (execution_id, task_type)",
        )
        .execute(&self.pool)
        .await?;

        // Backs the scheduler query's predicate and sort key.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tasks_scheduler ON tasks (time_started, time_completed, time_cancelled, time_failed, time_bounced)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create(&self, record: TaskRecord) -> Result<TaskRecord, StoreError> {
        let (task_type, payload) = split_task_data(&record.data)?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, execution_id, task_type,
                time_created, time_updated, time_started, time_completed,
                time_cancelled, time_failed, time_bounced, bounced,
                update_marker, executor_host, executor_pid, error, data, remove_at
            ) VALUES ($1, $2, $3, $4, $5, 0, 0, 0, 0, 0, 0, $6, '', 0, NULL, $7, 0)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.execution_id)
        .bind(task_type)
        .bind(record.time.created)
        .bind(record.time.updated)
        .bind(&record.update_marker)
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn bounce(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError> {
        // The bounce deadline depends on the current bounce count, so this
        // transition reads first, then issues a marker-guarded write — the
        // same optimistic-locking shape as every other transition, just
        // split across two round trips instead of one.
        let current = self.get(id).await?.ok_or(StoreError::NotFound(id))?;
        if current.update_marker != expected_marker {
            return Err(Transition::Bounce.forbidden().into());
        }
        state_machine::check_bounce(&current)?;

        let new_bounced = current.bounced + 1;
        let new_deadline = new_bounce_time(now, current.bounced);
        let new_marker = new_update_marker();

        let row = sqlx::query(
            r#"
            UPDATE tasks SET
                update_marker = $1, time_updated = $2, bounced = $3, time_bounced = $4
            WHERE id = $5 AND update_marker = $6
              AND time_completed = 0 AND time_cancelled = 0 AND time_failed = 0
              AND time_started = 0
            RETURNING *
            "#,
        )
        .bind(&new_marker)
        .bind(now)
        .bind(new_bounced as i32)
        .bind(new_deadline)
        .bind(id.to_string())
        .bind(expected_marker)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => row_to_record(&r),
            None => Err(Transition::Bounce.forbidden().into()),
        }
    }

    async fn start(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE tasks SET update_marker = $1, time_updated = $2, time_started = $2
            WHERE id = $3 AND update_marker = $4
              AND time_completed = 0 AND time_cancelled = 0 AND time_failed = 0
              AND time_started = 0
            RETURNING *
            "#,
        )
        .bind(new_update_marker())
        .bind(now)
        .bind(id.to_string())
        .bind(expected_marker)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => row_to_record(&r),
            None => Err(Transition::Start.forbidden().into()),
        }
    }

    async fn complete(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE tasks SET
                update_marker = $1, time_updated = $2, time_completed = $2, remove_at = $3
            WHERE id = $4 AND update_marker = $5
              AND time_completed = 0 AND time_cancelled = 0 AND time_failed = 0
              AND time_started != 0
            RETURNING *
            "#,
        )
        .bind(new_update_marker())
        .bind(now)
        .bind(now + self.config.ttl_seconds)
        .bind(id.to_string())
        .bind(expected_marker)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => row_to_record(&r),
            None => Err(Transition::Complete.forbidden().into()),
        }
    }

    async fn fail(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
        error: String,
    ) -> Result<TaskRecord, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE tasks SET
                update_marker = $1, time_updated = $2, time_failed = $2, error = $3, remove_at = $4
            WHERE id = $5 AND update_marker = $6
              AND time_completed = 0 AND time_cancelled = 0 AND time_failed = 0
              AND time_started != 0
            RETURNING *
            "#,
        )
        .bind(new_update_marker())
        .bind(now)
        .bind(&error)
        .bind(now + self.config.ttl_seconds)
        .bind(id.to_string())
        .bind(expected_marker)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => row_to_record(&r),
            None => Err(Transition::Fail.forbidden().into()),
        }
    }

    async fn cancel(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE tasks SET
                update_marker = $1, time_updated = $2, time_cancelled = $2, remove_at = $3
            WHERE id = $4 AND update_marker = $5
              AND time_completed = 0 AND time_cancelled = 0 AND time_failed = 0
            RETURNING *
            "#,
        )
        .bind(new_update_marker())
        .bind(now)
        .bind(now + self.config.ttl_seconds)
        .bind(id.to_string())
        .bind(expected_marker)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => row_to_record(&r),
            None => Err(Transition::Cancel.forbidden().into()),
        }
    }

    async fn set_executor_data(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
        host: String,
        pid: i64,
    ) -> Result<TaskRecord, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE tasks SET
                update_marker = $1, time_updated = $2, executor_host = $3, executor_pid = $4
            WHERE id = $5 AND update_marker = $6
              AND time_completed = 0 AND time_cancelled = 0 AND time_failed = 0
              AND time_started != 0 AND executor_host = '' AND executor_pid = 0
            RETURNING *
            "#,
        )
        .bind(new_update_marker())
        .bind(now)
        .bind(&host)
        .bind(pid)
        .bind(id.to_string())
        .bind(expected_marker)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => row_to_record(&r),
            None => Err(Transition::SetExecutor.forbidden().into()),
        }
    }

    async fn next_eligible(&self, now: i64) -> Result<Option<TaskRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE time_started = 0 AND time_completed = 0 AND time_cancelled = 0
              AND time_failed = 0 AND time_bounced <= $1
            ORDER BY bounced DESC, time_bounced ASC, time_created ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_by_execution(
        &self,
        execution_id: &str,
        task_type: TaskType,
    ) -> Result<Option<TaskRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE execution_id = $1 AND task_type = $2")
            .bind(execution_id)
            .bind(task_type.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn expire_terminal_tasks(&self, now: i64) -> Result<Vec<TaskId>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "DELETE FROM tasks WHERE remove_at != 0 AND remove_at <= $1 RETURNING id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        ids.into_iter()
            .map(|s| TaskId::try_from(s.clone()).map_err(|_| StoreError::Database(format!("malformed task id {s}"))))
            .collect()
    }

    async fn task_count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn maintenance(&self, now: i64) -> Result<(), StoreError> {
        let removed = self.expire_terminal_tasks(now).await?;
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "expired terminal tasks");
        }
        sqlx::query("ANALYZE tasks").execute(&self.pool).await?;
        Ok(())
    }
}
