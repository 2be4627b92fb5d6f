//! Review workflow engine.
//!
//! Owns the UserTask state machine at the persistence boundary: loads the
//! record, applies the pure transition from `types`, and commits it with a
//! check-and-set so that concurrent transitions produce exactly one winner.
//! Notification dispatch happens after the commit and never rolls it back.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::ports::{
    dispatch_notification, NotificationChannel, OpenUserTaskIds, PhotoStore, Result, UserStore,
    UserTaskStore,
};
use crate::types::{Photo, ReviewOutcome, UserTask, UserTaskStatus, DEFAULT_ATTEMPT_LIMIT};

pub struct ReviewEngine {
    user_tasks: Arc<dyn UserTaskStore>,
    users: Arc<dyn UserStore>,
    photos: Arc<dyn PhotoStore>,
    channel: Arc<dyn NotificationChannel>,
    attempt_limit: i32,
}

impl ReviewEngine {
    pub fn new(
        user_tasks: Arc<dyn UserTaskStore>,
        users: Arc<dyn UserStore>,
        photos: Arc<dyn PhotoStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            user_tasks,
            users,
            photos,
            channel,
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
        }
    }

    pub fn with_attempt_limit(mut self, limit: i32) -> Self {
        self.attempt_limit = limit;
        self
    }

    pub fn attempt_limit(&self) -> i32 {
        self.attempt_limit
    }

    /// Attach a proof photo to an occurrence and put it under review.
    ///
    /// Legal from New or Rejected; a resubmission increments the attempt
    /// number and fails with `AttemptLimitExceeded` once the cap is reached.
    /// The previous photo reference, if any, is orphaned for external cleanup.
    pub async fn submit(&self, user_task_id: Uuid, photo_url: &str) -> Result<UserTask> {
        let mut user_task = self.user_tasks.get(user_task_id).await?;
        let expected = user_task.status;

        let photo = Photo::new(photo_url);
        user_task.submit(photo.id, self.attempt_limit)?;

        // The photo row is written first so the committed user task never
        // references a photo that does not exist.
        self.photos.create(&photo).await?;
        let updated = self
            .user_tasks
            .update_checked(user_task_id, expected, &user_task)
            .await?;
        debug!(
            user_task_id = %user_task_id,
            attempt = updated.attempt_number,
            "report submitted for review"
        );
        Ok(updated)
    }

    /// Record the staff decision and tell the volunteer about it.
    ///
    /// Legal only from UnderReview. The notification is dispatched after the
    /// commit; a channel failure is logged and the decision stands.
    pub async fn decide(&self, user_task_id: Uuid, outcome: ReviewOutcome) -> Result<UserTask> {
        let mut user_task = self.user_tasks.get(user_task_id).await?;
        let expected = user_task.status;

        let note = user_task.decide(outcome)?;
        let updated = self
            .user_tasks
            .update_checked(user_task_id, expected, &user_task)
            .await?;
        debug!(user_task_id = %user_task_id, status = %updated.status, "report reviewed");

        let user = self.users.get(updated.user_id).await?;
        dispatch_notification(self.channel.as_ref(), &user, note).await;
        Ok(updated)
    }

    /// Close out an occurrence whose task date elapsed without a submission.
    /// Invoked by the external scheduler; legal only from New.
    pub async fn mark_not_submitted(&self, user_task_id: Uuid) -> Result<UserTask> {
        let mut user_task = self.user_tasks.get(user_task_id).await?;
        let expected = user_task.status;

        user_task.mark_not_submitted()?;
        self.user_tasks
            .update_checked(user_task_id, expected, &user_task)
            .await
    }

    /// Count of `status` among the user's `window` most recent qualifying
    /// occurrences (not New, not soft-deleted). This is the policy primitive
    /// behind escalation rules such as "3 of the last 5 rejected ⇒ block".
    pub async fn windowed_outcome_count(
        &self,
        user_id: Uuid,
        window: i64,
        status: UserTaskStatus,
    ) -> Result<i64> {
        self.user_tasks
            .windowed_status_count(user_id, window, status)
            .await
    }

    /// Ids of all occurrences awaiting a staff decision, ascending.
    pub async fn ids_awaiting_review(&self) -> Result<Vec<Uuid>> {
        self.user_tasks.ids_awaiting_review().await
    }

    /// Open occurrences for one shift day, for assignment and reporting.
    pub async fn open_ids_for_date(
        &self,
        shift_id: Uuid,
        task_date: NaiveDate,
    ) -> Result<Vec<OpenUserTaskIds>> {
        self.user_tasks.open_ids_for_date(shift_id, task_date).await
    }
}
