/// Photo record persistence
use crate::{error::SiteResult, photos::model::Photo};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

#[derive(Clone)]
pub struct PhotoStore {
    pool: SqlitePool,
}

fn photo_from_row(row: &SqliteRow) -> Result<Photo, sqlx::Error> {
    Ok(Photo {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        primary_url: row.try_get("primary_url")?,
        backend_file_id: row.try_get("backend_file_id")?,
        local_path: row.try_get("local_path")?,
        needs_sync: row.try_get("needs_sync")?,
        description: row.try_get("description")?,
        uploaded_by: row.try_get("uploaded_by")?,
        created_at: row.try_get("created_at")?,
        size_bytes: row.try_get("size_bytes")?,
        mime_type: row.try_get("mime_type")?,
    })
}

impl PhotoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, photo: &Photo) -> SiteResult<()> {
        sqlx::query(
            "INSERT INTO photos (id, task_id, primary_url, backend_file_id, local_path,
                                 needs_sync, description, uploaded_by, created_at,
                                 size_bytes, mime_type)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&photo.id)
        .bind(&photo.task_id)
        .bind(&photo.primary_url)
        .bind(&photo.backend_file_id)
        .bind(&photo.local_path)
        .bind(photo.needs_sync)
        .bind(&photo.description)
        .bind(&photo.uploaded_by)
        .bind(photo.created_at)
        .bind(photo.size_bytes)
        .bind(&photo.mime_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> SiteResult<Option<Photo>> {
        let row = sqlx::query("SELECT * FROM photos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(photo_from_row).transpose().map_err(Into::into)
    }

    /// Photos for one task, newest first
    pub async fn list_for_task(&self, task_id: &str) -> SiteResult<Vec<Photo>> {
        let rows = sqlx::query(
            "SELECT * FROM photos WHERE task_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(photo_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Returns false when no such photo exists
    pub async fn update_description(
        &self,
        id: &str,
        description: Option<&str>,
    ) -> SiteResult<bool> {
        let result = sqlx::query("UPDATE photos SET description = ? WHERE id = ?")
            .bind(description)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: &str) -> SiteResult<bool> {
        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Oldest-first batch of photos still owing the primary a copy
    pub async fn list_needing_sync(&self, limit: i64) -> SiteResult<Vec<Photo>> {
        let rows = sqlx::query(
            "SELECT * FROM photos WHERE needs_sync = 1 ORDER BY created_at ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(photo_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Point the record at the freshly synced primary copy
    pub async fn mark_synced(
        &self,
        id: &str,
        primary_url: &str,
        backend_file_id: Option<&str>,
    ) -> SiteResult<()> {
        sqlx::query(
            "UPDATE photos SET needs_sync = 0, primary_url = ?, backend_file_id = ?
             WHERE id = ?",
        )
        .bind(primary_url)
        .bind(backend_file_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use chrono::Utc;

    async fn seed_task(pool: &SqlitePool, id: &str) {
        sqlx::query("INSERT INTO tasks (id, name, created_at) VALUES (?, 'Pour slab', ?)")
            .bind(id)
            .bind(Utc::now())
            .execute(pool)
            .await
            .unwrap();
    }

    fn sample_photo(id: &str, task_id: &str) -> Photo {
        Photo {
            id: id.to_string(),
            task_id: task_id.to_string(),
            primary_url: Some(format!("http://localhost/uploads/t/{}.jpg", id)),
            backend_file_id: None,
            local_path: Some(format!("t/{}.jpg", id)),
            needs_sync: false,
            description: Some("rebar before pour".to_string()),
            uploaded_by: Some("kim".to_string()),
            created_at: Utc::now(),
            size_bytes: 1024,
            mime_type: "image/jpeg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let pool = memory_pool().await;
        seed_task(&pool, "t1").await;
        let store = PhotoStore::new(pool);

        let photo = sample_photo("p1", "t1");
        store.insert(&photo).await.unwrap();

        let loaded = store.get("p1").await.unwrap().unwrap();
        assert_eq!(loaded.task_id, "t1");
        assert_eq!(loaded.description.as_deref(), Some("rebar before pour"));
        assert!(!loaded.needs_sync);
        assert_eq!(loaded.size_bytes, 1024);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let pool = memory_pool().await;
        seed_task(&pool, "t1").await;
        let store = PhotoStore::new(pool);

        for (i, id) in ["p1", "p2", "p3"].iter().enumerate() {
            let mut photo = sample_photo(id, "t1");
            photo.created_at = Utc::now() + chrono::Duration::seconds(i as i64);
            store.insert(&photo).await.unwrap();
        }

        let listed = store.list_for_task("t1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2", "p1"]);
    }

    #[tokio::test]
    async fn test_insert_requires_existing_task() {
        let pool = memory_pool().await;
        let store = PhotoStore::new(pool);

        let result = store.insert(&sample_photo("p1", "no-such-task")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_task_delete_cascades_to_photos() {
        let pool = memory_pool().await;
        seed_task(&pool, "t1").await;
        let store = PhotoStore::new(pool.clone());
        store.insert(&sample_photo("p1", "t1")).await.unwrap();

        sqlx::query("DELETE FROM tasks WHERE id = 't1'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(store.get("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_description_and_missing_row() {
        let pool = memory_pool().await;
        seed_task(&pool, "t1").await;
        let store = PhotoStore::new(pool);
        store.insert(&sample_photo("p1", "t1")).await.unwrap();

        assert!(store.update_description("p1", Some("after pour")).await.unwrap());
        let loaded = store.get("p1").await.unwrap().unwrap();
        assert_eq!(loaded.description.as_deref(), Some("after pour"));

        assert!(store.update_description("p1", None).await.unwrap());
        assert!(store.get("p1").await.unwrap().unwrap().description.is_none());

        assert!(!store.update_description("ghost", Some("x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_queue_and_mark_synced() {
        let pool = memory_pool().await;
        seed_task(&pool, "t1").await;
        let store = PhotoStore::new(pool);

        let mut pending = sample_photo("p1", "t1");
        pending.needs_sync = true;
        pending.primary_url = None;
        store.insert(&pending).await.unwrap();
        store.insert(&sample_photo("p2", "t1")).await.unwrap();

        let queue = store.list_needing_sync(10).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, "p1");

        store
            .mark_synced("p1", "https://cdn.example.com/photos/t/p1.jpg", Some("photos/t/p1.jpg"))
            .await
            .unwrap();

        assert!(store.list_needing_sync(10).await.unwrap().is_empty());
        let synced = store.get("p1").await.unwrap().unwrap();
        assert!(!synced.needs_sync);
        assert_eq!(
            synced.primary_url.as_deref(),
            Some("https://cdn.example.com/photos/t/p1.jpg")
        );
        assert_eq!(synced.backend_file_id.as_deref(), Some("photos/t/p1.jpg"));
    }
}
