//! Request lifecycle engine — admission of users to shifts.
//!
//! Same shape as the review engine: load, pure transition, check-and-set
//! commit, then best-effort notification. Blocking a user is a pure request
//! status change; recorded UserTask history is never touched.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::RotaError;
use crate::ports::{dispatch_notification, NotificationChannel, RequestStore, Result, UserStore};
use crate::types::{Request, RequestStatus};

pub struct AdmissionEngine {
    requests: Arc<dyn RequestStore>,
    users: Arc<dyn UserStore>,
    channel: Arc<dyn NotificationChannel>,
}

impl AdmissionEngine {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        users: Arc<dyn UserStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            requests,
            users,
            channel,
        }
    }

    /// Apply a staff decision (or the blocking policy) to a request.
    ///
    /// Re-applying the current status fails with `AlreadyReviewed`; the
    /// committed status is announced to the user (approval template for
    /// Approved, rejection/blocked template otherwise), and a channel
    /// failure never reverts the decision.
    pub async fn review(&self, request_id: Uuid, new_status: RequestStatus) -> Result<Request> {
        let mut request = self.requests.get(request_id).await?;
        let expected = request.status;

        let note = request.review(new_status)?;
        let updated = self
            .requests
            .update_status_checked(request_id, expected, &request)
            .await?;
        info!(request_id = %request_id, status = %updated.status, "request reviewed");

        let user = self.users.get(updated.user_id).await?;
        dispatch_notification(self.channel.as_ref(), &user, note).await;
        Ok(updated)
    }

    /// Block a user from a shift so no further tasks are assigned to them
    /// there (the external scheduler consults the request status).
    ///
    /// Idempotent in effect: a request that is already Blocked is returned
    /// unchanged without raising or re-notifying.
    pub async fn block_user(&self, user_id: Uuid, shift_id: Uuid) -> Result<Request> {
        let request = self
            .requests
            .find_by_user_and_shift(user_id, shift_id)
            .await?
            .ok_or_else(|| {
                RotaError::NotFound(format!("request for user {user_id} in shift {shift_id}"))
            })?;
        if request.status == RequestStatus::Blocked {
            return Ok(request);
        }
        self.review(request.id, RequestStatus::Blocked).await
    }

    /// Ids of users approved for the shift, ascending by user id. Used by
    /// assignment and by reporting headcounts.
    pub async fn approved_user_ids(&self, shift_id: Uuid) -> Result<Vec<Uuid>> {
        self.requests.approved_user_ids(shift_id).await
    }
}
