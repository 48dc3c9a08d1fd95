/// Task record persistence
use crate::{
    error::{SiteError, SiteResult},
    tasks::model::Task,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

fn task_from_row(row: &SqliteRow) -> Result<Task, sqlx::Error> {
    Ok(Task {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        project_id: row.try_get("project_id")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, project_id: Option<&str>) -> SiteResult<Task> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SiteError::Validation("Task name cannot be empty".to_string()));
        }

        let task = Task {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            project_id: project_id.map(String::from),
            status: "todo".to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO tasks (id, name, project_id, status, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.name)
        .bind(&task.project_id)
        .bind(&task.status)
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;

        Ok(task)
    }

    pub async fn get(&self, id: &str) -> SiteResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(task_from_row).transpose().map_err(Into::into)
    }

    pub async fn list(&self) -> SiteResult<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Update name and/or status; unchanged fields keep their value
    pub async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        status: Option<&str>,
    ) -> SiteResult<Option<Task>> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(SiteError::Validation("Task name cannot be empty".to_string()));
            }
        }

        let result = sqlx::query(
            "UPDATE tasks SET name = COALESCE(?, name), status = COALESCE(?, status)
             WHERE id = ?",
        )
        .bind(name.map(str::trim))
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Photo rows go with the task via ON DELETE CASCADE
    pub async fn delete(&self, id: &str) -> SiteResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = TaskStore::new(memory_pool().await);

        let task = store.create("Frame second floor", Some("proj-1")).await.unwrap();
        assert_eq!(task.status, "todo");

        let loaded = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Frame second floor");
        assert_eq!(loaded.project_id.as_deref(), Some("proj-1"));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let store = TaskStore::new(memory_pool().await);
        assert!(store.create("   ", None).await.is_err());
    }

    #[tokio::test]
    async fn test_update_partial_fields() {
        let store = TaskStore::new(memory_pool().await);
        let task = store.create("Pour footing", None).await.unwrap();

        let updated = store
            .update(&task.id, None, Some("done"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Pour footing");
        assert_eq!(updated.status, "done");

        assert!(store.update("ghost", None, Some("done")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = TaskStore::new(memory_pool().await);
        let task = store.create("Demo wall", None).await.unwrap();

        assert!(store.delete(&task.id).await.unwrap());
        assert!(!store.delete(&task.id).await.unwrap());
        assert!(store.get(&task.id).await.unwrap().is_none());
    }
}
