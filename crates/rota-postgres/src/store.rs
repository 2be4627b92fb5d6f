//! Postgres implementations of the rota-core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid a compile-time DB requirement.
//! Check-and-set updates carry the expected status in the WHERE clause; a
//! zero-row result on an existing id means a concurrent transition won.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use rota_core::error::RotaError;
use rota_core::ports::{
    not_found, OpenUserTaskIds, PhotoStore, RequestStore, Result, ShiftStore, TaskStore,
    UserStore, UserTaskStore,
};
use rota_core::types::*;

use crate::sqlx_types::*;

const USER_COLS: &str = "id, created_at, updated_at, name, surname, date_of_birth, city, phone_number";
const SHIFT_COLS: &str =
    "id, created_at, updated_at, status::text, title, sequence_number, started_at, finished_at";
const TASK_COLS: &str = "id, created_at, updated_at, description, photo_subject";
const PHOTO_COLS: &str = "id, created_at, updated_at, url";
const REQUEST_COLS: &str = "id, created_at, updated_at, user_id, shift_id, status::text";
const USER_TASK_COLS: &str = "id, created_at, updated_at, user_id, shift_id, task_id, task_date, \
     status::text, attempt_number, deleted, photo_id";

// ── PgUserStore ───────────────────────────────────────────────

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get(&self, id: Uuid) -> Result<User> {
        self.get_or_none(id).await?.ok_or_else(|| not_found("user", id))
    }

    async fn get_or_none(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, PgUserRow>(&format!(
            "SELECT {USER_COLS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(User::from))
    }

    async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, created_at, updated_at, name, surname,
                               date_of_birth, city, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(&user.name)
        .bind(&user.surname)
        .bind(user.date_of_birth)
        .bind(&user.city)
        .bind(&user.phone_number)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn update(&self, id: Uuid, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, surname = $3, date_of_birth = $4, city = $5,
                phone_number = $6, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&user.name)
        .bind(&user.surname)
        .bind(user.date_of_birth)
        .bind(&user.city)
        .bind(&user.phone_number)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(not_found("user", id));
        }
        Ok(())
    }
}

// ── PgShiftStore ──────────────────────────────────────────────

pub struct PgShiftStore {
    pool: PgPool,
}

impl PgShiftStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShiftStore for PgShiftStore {
    async fn get(&self, id: Uuid) -> Result<Shift> {
        self.get_or_none(id).await?.ok_or_else(|| not_found("shift", id))
    }

    async fn get_or_none(&self, id: Uuid) -> Result<Option<Shift>> {
        let row = sqlx::query_as::<_, PgShiftRow>(&format!(
            "SELECT {SHIFT_COLS} FROM shifts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| Shift::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))))
            .transpose()
    }

    async fn create(&self, shift: &Shift) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shifts (id, created_at, updated_at, status, title,
                                sequence_number, started_at, finished_at)
            VALUES ($1, $2, $3, $4::shift_status, $5, $6, $7, $8)
            "#,
        )
        .bind(shift.id)
        .bind(shift.created_at)
        .bind(shift.updated_at)
        .bind(shift.status.as_str())
        .bind(&shift.title)
        .bind(shift.sequence_number)
        .bind(shift.started_at)
        .bind(shift.finished_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn update(&self, id: Uuid, shift: &Shift) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET status = $2::shift_status, title = $3, sequence_number = $4,
                started_at = $5, finished_at = $6, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(shift.status.as_str())
        .bind(&shift.title)
        .bind(shift.sequence_number)
        .bind(shift.started_at)
        .bind(shift.finished_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(not_found("shift", id));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Shift>> {
        let rows = sqlx::query_as::<_, PgShiftRow>(&format!(
            "SELECT {SHIFT_COLS} FROM shifts ORDER BY started_at, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| Shift::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))))
            .collect()
    }
}

// ── PgTaskStore ───────────────────────────────────────────────

pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn get(&self, id: Uuid) -> Result<Task> {
        let row = sqlx::query_as::<_, PgTaskRow>(&format!(
            "SELECT {TASK_COLS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(Task::from).ok_or_else(|| not_found("task", id))
    }

    async fn create(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, created_at, updated_at, description, photo_subject)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(task.id)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(&task.description)
        .bind(&task.photo_subject)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn update(&self, id: Uuid, task: &Task) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET description = $2, photo_subject = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&task.description)
        .bind(&task.photo_subject)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(not_found("task", id));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, PgTaskRow>(&format!(
            "SELECT {TASK_COLS} FROM tasks ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Task::from).collect())
    }
}

// ── PgPhotoStore ──────────────────────────────────────────────

pub struct PgPhotoStore {
    pool: PgPool,
}

impl PgPhotoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoStore for PgPhotoStore {
    async fn get(&self, id: Uuid) -> Result<Photo> {
        let row = sqlx::query_as::<_, PgPhotoRow>(&format!(
            "SELECT {PHOTO_COLS} FROM photos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(Photo::from).ok_or_else(|| not_found("photo", id))
    }

    async fn create(&self, photo: &Photo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO photos (id, created_at, updated_at, url)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(photo.id)
        .bind(photo.created_at)
        .bind(photo.updated_at)
        .bind(&photo.url)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

// ── PgRequestStore ────────────────────────────────────────────

pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn get(&self, id: Uuid) -> Result<Request> {
        let row = sqlx::query_as::<_, PgRequestRow>(&format!(
            "SELECT {REQUEST_COLS} FROM requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| Request::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))))
            .transpose()?
            .ok_or_else(|| not_found("request", id))
    }

    async fn create(&self, request: &Request) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO requests (id, created_at, updated_at, user_id, shift_id, status)
            VALUES ($1, $2, $3, $4, $5, $6::request_status)
            "#,
        )
        .bind(request.id)
        .bind(request.created_at)
        .bind(request.updated_at)
        .bind(request.user_id)
        .bind(request.shift_id)
        .bind(request.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn update_status_checked(
        &self,
        id: Uuid,
        expected: RequestStatus,
        request: &Request,
    ) -> Result<Request> {
        let row = sqlx::query_as::<_, PgRequestRow>(&format!(
            r#"
            UPDATE requests
            SET status = $3::request_status, updated_at = now()
            WHERE id = $1 AND status = $2::request_status
            RETURNING {REQUEST_COLS}
            "#
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(request.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        match row {
            Some(r) => Request::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))),
            // Zero rows: either the request is gone or a concurrent
            // transition moved it off the expected status.
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM requests WHERE id = $1)",
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
                if exists {
                    Err(RotaError::ConflictingUpdate(format!(
                        "request {id} was updated concurrently"
                    )))
                } else {
                    Err(not_found("request", id))
                }
            }
        }
    }

    async fn find_by_user_and_shift(
        &self,
        user_id: Uuid,
        shift_id: Uuid,
    ) -> Result<Option<Request>> {
        let row = sqlx::query_as::<_, PgRequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLS} FROM requests
            WHERE user_id = $1 AND shift_id = $2 AND status <> 'rejected'
            "#
        ))
        .bind(user_id)
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| Request::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))))
            .transpose()
    }

    async fn approved_user_ids(&self, shift_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id FROM requests
            WHERE shift_id = $1 AND status = 'approved'
            ORDER BY user_id
            "#,
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(ids)
    }
}

// ── PgUserTaskStore ───────────────────────────────────────────

pub struct PgUserTaskStore {
    pool: PgPool,
}

impl PgUserTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn deleted_clause(include_deleted: bool) -> &'static str {
        if include_deleted {
            "TRUE"
        } else {
            "deleted = FALSE"
        }
    }
}

#[async_trait]
impl UserTaskStore for PgUserTaskStore {
    async fn get(&self, id: Uuid) -> Result<UserTask> {
        self.get_or_none(id)
            .await?
            .ok_or_else(|| not_found("user_task", id))
    }

    async fn get_or_none(&self, id: Uuid) -> Result<Option<UserTask>> {
        let row = sqlx::query_as::<_, PgUserTaskRow>(&format!(
            "SELECT {USER_TASK_COLS} FROM user_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| UserTask::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))))
            .transpose()
    }

    async fn create(&self, user_task: &UserTask) -> Result<()> {
        self.create_all(std::slice::from_ref(user_task)).await
    }

    async fn create_all(&self, user_tasks: &[UserTask]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        for ut in user_tasks {
            sqlx::query(
                r#"
                INSERT INTO user_tasks (id, created_at, updated_at, user_id, shift_id,
                                        task_id, task_date, status, attempt_number,
                                        deleted, photo_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8::user_task_status, $9, $10, $11)
                "#,
            )
            .bind(ut.id)
            .bind(ut.created_at)
            .bind(ut.updated_at)
            .bind(ut.user_id)
            .bind(ut.shift_id)
            .bind(ut.task_id)
            .bind(ut.task_date)
            .bind(ut.status.as_str())
            .bind(ut.attempt_number)
            .bind(ut.deleted)
            .bind(ut.photo_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn update_checked(
        &self,
        id: Uuid,
        expected: UserTaskStatus,
        user_task: &UserTask,
    ) -> Result<UserTask> {
        let row = sqlx::query_as::<_, PgUserTaskRow>(&format!(
            r#"
            UPDATE user_tasks
            SET status = $3::user_task_status, attempt_number = $4, deleted = $5,
                photo_id = $6, updated_at = now()
            WHERE id = $1 AND status = $2::user_task_status
            RETURNING {USER_TASK_COLS}
            "#
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(user_task.status.as_str())
        .bind(user_task.attempt_number)
        .bind(user_task.deleted)
        .bind(user_task.photo_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        match row {
            Some(r) => UserTask::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))),
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM user_tasks WHERE id = $1)",
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
                if exists {
                    Err(RotaError::ConflictingUpdate(format!(
                        "user_task {id} was updated concurrently"
                    )))
                } else {
                    Err(not_found("user_task", id))
                }
            }
        }
    }

    async fn windowed_status_count(
        &self,
        user_id: Uuid,
        window: i64,
        status: UserTaskStatus,
    ) -> Result<i64> {
        // Tie-break on identical task_date: created_at desc, then id desc.
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM (
                SELECT status::text AS status FROM user_tasks
                WHERE user_id = $1 AND status <> 'new' AND deleted = FALSE
                ORDER BY task_date DESC, created_at DESC, id DESC
                LIMIT $2
            ) recent
            WHERE recent.status = $3
            "#,
        )
        .bind(user_id)
        .bind(window)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(count)
    }

    async fn ids_awaiting_review(&self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM user_tasks
            WHERE status = 'under_review' AND deleted = FALSE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(ids)
    }

    async fn open_ids_for_date(
        &self,
        shift_id: Uuid,
        task_date: NaiveDate,
    ) -> Result<Vec<OpenUserTaskIds>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid)>(
            r#"
            SELECT id, user_id, task_id FROM user_tasks
            WHERE shift_id = $1 AND task_date = $2 AND deleted = FALSE
              AND status IN ('new', 'under_review')
            ORDER BY id
            "#,
        )
        .bind(shift_id)
        .bind(task_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows
            .into_iter()
            .map(|(user_task_id, user_id, task_id)| OpenUserTaskIds {
                user_task_id,
                user_id,
                task_id,
            })
            .collect())
    }

    async fn list_for_task(&self, task_id: Uuid, include_deleted: bool) -> Result<Vec<UserTask>> {
        let rows = sqlx::query_as::<_, PgUserTaskRow>(&format!(
            r#"
            SELECT {USER_TASK_COLS} FROM user_tasks
            WHERE task_id = $1 AND {}
            ORDER BY task_date, id
            "#,
            Self::deleted_clause(include_deleted)
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| UserTask::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))))
            .collect()
    }

    async fn list_for_shift(
        &self,
        shift_id: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<UserTask>> {
        let rows = sqlx::query_as::<_, PgUserTaskRow>(&format!(
            r#"
            SELECT {USER_TASK_COLS} FROM user_tasks
            WHERE shift_id = $1 AND {}
            ORDER BY task_date, id
            "#,
            Self::deleted_clause(include_deleted)
        ))
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| UserTask::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))))
            .collect()
    }

    async fn list_all(&self, include_deleted: bool) -> Result<Vec<UserTask>> {
        let rows = sqlx::query_as::<_, PgUserTaskRow>(&format!(
            "SELECT {USER_TASK_COLS} FROM user_tasks WHERE {} ORDER BY task_date, id",
            Self::deleted_clause(include_deleted)
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| UserTask::try_from(r).map_err(|e| RotaError::Internal(anyhow!(e))))
            .collect()
    }
}
