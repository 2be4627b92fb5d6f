//! Storage and notification port traits.
//! Implemented by rota-postgres — the engines depend only on these traits.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::RotaError;
use crate::types::*;

pub type Result<T> = std::result::Result<T, RotaError>;

// ── Entity stores ─────────────────────────────────────────────

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<User>;
    async fn get_or_none(&self, id: Uuid) -> Result<Option<User>>;
    async fn create(&self, user: &User) -> Result<()>;
    async fn update(&self, id: Uuid, user: &User) -> Result<()>;
}

#[async_trait]
pub trait ShiftStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Shift>;
    async fn get_or_none(&self, id: Uuid) -> Result<Option<Shift>>;
    async fn create(&self, shift: &Shift) -> Result<()>;
    async fn update(&self, id: Uuid, shift: &Shift) -> Result<()>;
    async fn list(&self) -> Result<Vec<Shift>>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Task>;
    async fn create(&self, task: &Task) -> Result<()>;
    async fn update(&self, id: Uuid, task: &Task) -> Result<()>;
    /// All task definitions in stable definition order
    /// (created_at ascending, then id ascending).
    async fn list(&self) -> Result<Vec<Task>>;
}

#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Photo>;
    async fn create(&self, photo: &Photo) -> Result<()>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Request>;
    async fn create(&self, request: &Request) -> Result<()>;

    /// Check-and-set status update. Fails with `ConflictingUpdate` when the
    /// stored status no longer matches `expected` (a concurrent transition
    /// won the race), with `NotFound` when the row does not exist.
    async fn update_status_checked(
        &self,
        id: Uuid,
        expected: RequestStatus,
        request: &Request,
    ) -> Result<Request>;

    /// The unique non-rejected request for a (user, shift) pair, if any.
    async fn find_by_user_and_shift(
        &self,
        user_id: Uuid,
        shift_id: Uuid,
    ) -> Result<Option<Request>>;

    /// Ids of users approved for the shift, ascending by user id.
    async fn approved_user_ids(&self, shift_id: Uuid) -> Result<Vec<Uuid>>;
}

/// Identifiers of one open occurrence, for downstream assignment logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenUserTaskIds {
    pub user_task_id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
}

#[async_trait]
pub trait UserTaskStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<UserTask>;
    async fn get_or_none(&self, id: Uuid) -> Result<Option<UserTask>>;
    async fn create(&self, user_task: &UserTask) -> Result<()>;
    async fn create_all(&self, user_tasks: &[UserTask]) -> Result<()>;

    /// Check-and-set full-record update, same contract as
    /// `RequestStore::update_status_checked`.
    async fn update_checked(
        &self,
        id: Uuid,
        expected: UserTaskStatus,
        user_task: &UserTask,
    ) -> Result<UserTask>;

    /// Count of `status` among the user's `window` most recent qualifying
    /// occurrences. Qualifying = not New, not soft-deleted. Ordered by
    /// task_date descending with the deterministic tie-break created_at
    /// descending, then id descending.
    async fn windowed_status_count(
        &self,
        user_id: Uuid,
        window: i64,
        status: UserTaskStatus,
    ) -> Result<i64>;

    /// Ids of all occurrences awaiting a staff decision, ascending by id.
    async fn ids_awaiting_review(&self) -> Result<Vec<Uuid>>;

    /// Open (New or UnderReview) occurrences for one shift day, ascending
    /// by user-task id.
    async fn open_ids_for_date(
        &self,
        shift_id: Uuid,
        task_date: NaiveDate,
    ) -> Result<Vec<OpenUserTaskIds>>;

    async fn list_for_task(&self, task_id: Uuid, include_deleted: bool) -> Result<Vec<UserTask>>;
    async fn list_for_shift(&self, shift_id: Uuid, include_deleted: bool)
        -> Result<Vec<UserTask>>;
    async fn list_all(&self, include_deleted: bool) -> Result<Vec<UserTask>>;
}

// ── Notification channel ──────────────────────────────────────

/// Outbound user messaging. Fire-and-forget from the engines' perspective:
/// a failed dispatch is logged and never rolls back the state transition.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify_approved(&self, user: &User) -> anyhow::Result<()>;
    async fn notify_rejected(&self, user: &User) -> anyhow::Result<()>;
    async fn notify_blocked(&self, user: &User) -> anyhow::Result<()>;
}

/// Tracing-only channel for tests and local runs.
pub struct LoggingChannel;

#[async_trait]
impl NotificationChannel for LoggingChannel {
    async fn notify_approved(&self, user: &User) -> anyhow::Result<()> {
        tracing::info!(user_id = %user.id, "notify: approved");
        Ok(())
    }

    async fn notify_rejected(&self, user: &User) -> anyhow::Result<()> {
        tracing::info!(user_id = %user.id, "notify: rejected");
        Ok(())
    }

    async fn notify_blocked(&self, user: &User) -> anyhow::Result<()> {
        tracing::info!(user_id = %user.id, "notify: blocked");
        Ok(())
    }
}

/// Helper used by both engines: dispatch an intent and swallow failures.
pub(crate) async fn dispatch_notification(
    channel: &dyn NotificationChannel,
    user: &User,
    note: Notification,
) {
    let result = match note {
        Notification::Approved => channel.notify_approved(user).await,
        Notification::Rejected => channel.notify_rejected(user).await,
        Notification::Blocked => channel.notify_blocked(user).await,
    };
    if let Err(e) = result {
        tracing::warn!(user_id = %user.id, ?note, error = %e, "notification dispatch failed");
    }
}

/// Uniform `NotFound` formatting for stores and engines.
pub fn not_found(entity: &str, id: Uuid) -> RotaError {
    RotaError::NotFound(format!("{entity} {id}"))
}
