use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use super::{StoreError, StoreResult, TaskFilter, TaskSort, TaskStore, UserStore};
use crate::models::{NewUser, Tag, Task, TaskStatus, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";
const TASK_COLUMNS: &str =
    "t.id, t.title, t.description, t.status, t.due_date, t.archived, t.created_at, t.user_id";

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    due_date: Option<DateTime<Utc>>,
    archived: bool,
    created_at: DateTime<Utc>,
    user_id: i32,
}

impl TaskRow {
    fn into_task(self, tags: Vec<Tag>) -> Task {
        Task {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            due_date: self.due_date,
            archived: self.archived,
            created_at: self.created_at,
            user_id: self.user_id,
            tags,
        }
    }
}

#[derive(Debug, FromRow)]
struct TaskTagRow {
    task_id: Uuid,
    id: i32,
    name: String,
}

/// PostgreSQL-backed store. Runs the embedded migrations on connect.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        log::info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Loads the tags of every row in one query and assembles the tasks.
    async fn with_tags(&self, rows: Vec<TaskRow>) -> StoreResult<Vec<Task>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let links = sqlx::query_as::<_, TaskTagRow>(
            "SELECT tt.task_id, g.id, g.name FROM task_tags tt \
             JOIN tags g ON g.id = tt.tag_id \
             WHERE tt.task_id = ANY($1) ORDER BY g.name",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_task: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for link in links {
            by_task.entry(link.task_id).or_default().push(Tag {
                id: link.id,
                name: link.name,
            });
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let tags = by_task.remove(&row.id).unwrap_or_default();
                row.into_task(tags)
            })
            .collect())
    }

    async fn with_tags_one(&self, row: TaskRow) -> StoreResult<Task> {
        self.with_tags(vec![row])
            .await?
            .pop()
            .ok_or(StoreError::Missing("task"))
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    qb.push(" WHERE t.user_id = ").push_bind(filter.owner_id);
    if !filter.include_archived {
        qb.push(" AND t.archived = FALSE");
    }
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status);
    }
    if let Some(tag) = &filter.tag {
        qb.push(
            " AND EXISTS (SELECT 1 FROM task_tags tt JOIN tags g ON g.id = tt.tag_id \
             WHERE tt.task_id = t.id AND g.name = ",
        )
        .push_bind(tag.clone())
        .push(")");
    }
    if let Some((start, end)) = filter.due_between {
        qb.push(" AND t.due_date BETWEEN ")
            .push_bind(start)
            .push(" AND ")
            .push_bind(end);
    }
    if let Some(now) = filter.overdue_at {
        qb.push(" AND t.due_date < ")
            .push_bind(now)
            .push(" AND t.status <> ")
            .push_bind(TaskStatus::Done);
    }
}

fn order_by(sort: TaskSort) -> String {
    let direction = sort.order.keyword();
    let (collate, nulls) = match sort.field {
        super::SortField::DueDate => ("", " NULLS LAST"),
        // byte order, as `MemoryStore` compares titles
        super::SortField::Title => (" COLLATE \"C\"", ""),
        _ => ("", ""),
    };
    format!(
        " ORDER BY t.{}{} {}{}, t.created_at {}, t.id {}",
        sort.field.column(),
        collate,
        direction,
        nulls,
        direction,
        direction
    )
}

/// Translates constraint violations into store-level errors.
fn map_write_error(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        match db.constraint() {
            Some("users_email_key") => {
                return StoreError::Conflict("Email already in use".into())
            }
            Some("users_username_key") => {
                return StoreError::Conflict("Username already in use".into())
            }
            Some("task_tags_task_id_fkey") => return StoreError::Missing("task"),
            Some("task_tags_tag_id_fkey") => return StoreError::Missing("tag"),
            _ => {}
        }
    }
    StoreError::Database(error)
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: Task) -> StoreResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "INSERT INTO tasks AS t (id, title, description, status, due_date, archived, created_at, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.due_date)
        .bind(task.archived)
        .bind(task.created_at)
        .bind(task.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(row.into_task(Vec::new()))
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks t WHERE t.id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.with_tags_one(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_task(&self, task: &Task) -> StoreResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE tasks AS t SET title = $1, description = $2, status = $3, due_date = $4, archived = $5 \
             WHERE t.id = $6 RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.due_date)
        .bind(task.archived)
        .bind(task.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::Missing("task"))?;
        self.with_tags_one(row).await
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tasks(&self, filter: &TaskFilter, sort: TaskSort) -> StoreResult<Vec<Task>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM tasks t", TASK_COLUMNS));
        push_filter(&mut qb, filter);
        qb.push(order_by(sort));
        let rows = qb.build_query_as::<TaskRow>().fetch_all(&self.pool).await?;
        self.with_tags(rows).await
    }

    async fn count_tasks(&self, filter: &TaskFilter) -> StoreResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks t");
        push_filter(&mut qb, filter);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn find_tasks(&self, ids: &[Uuid]) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks t WHERE t.id = ANY($1)",
            TASK_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        self.with_tags(rows).await
    }

    async fn set_status(&self, ids: &[Uuid], status: TaskStatus) -> StoreResult<Vec<Task>> {
        let mut unique = ids.to_vec();
        unique.sort();
        unique.dedup();

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE tasks AS t SET status = $1 WHERE t.id = ANY($2) RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(status)
        .bind(&unique)
        .fetch_all(&mut *tx)
        .await?;
        if rows.len() != unique.len() {
            tx.rollback().await?;
            return Err(StoreError::Missing("task"));
        }
        tx.commit().await?;
        self.with_tags(rows).await
    }

    async fn find_or_create_tag(&self, name: &str) -> StoreResult<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(tag)
    }

    async fn find_tag(&self, id: i32) -> StoreResult<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    async fn attach_tag(&self, task_id: Uuid, tag_id: i32) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO task_tags (task_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn detach_tag(&self, task_id: Uuid, tag_id: i32) -> StoreResult<()> {
        sqlx::query("DELETE FROM task_tags WHERE task_id = $1 AND tag_id = $2")
            .bind(task_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
