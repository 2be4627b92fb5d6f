//! Domain entities and their status state machines.
//! Pure value types — no sqlx, no DB dependencies.
//!
//! Transition legality is encoded in explicit `can_transition` tables on the
//! status enums, never inferred from declaration order. The transition
//! methods on the entities mutate in memory only and return the notification
//! intent where one is owed; persistence and dispatch are the engines' job.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RotaError;

/// How many submission attempts a volunteer gets per task occurrence.
/// The third rejection is final.
pub const DEFAULT_ATTEMPT_LIMIT: i32 = 3;

// ── Shift status ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Preparing,
    Started,
    Finished,
    Cancelled,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preparing" => Some(Self::Preparing),
            "started" => Some(Self::Started),
            "finished" => Some(Self::Finished),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Request status ────────────────────────────────────────────

/// Admission state for one (user, shift) pair.
///
/// Transitions:
///   Pending → Approved | Rejected   (staff decision)
///   Approved → Blocked              (policy escalation)
/// Rejected and Blocked are terminal; Blocked never regresses to Approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Blocked,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Blocked)
    }

    /// Explicit allowed-transitions table.
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Blocked)
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── UserTask status ───────────────────────────────────────────

/// Review state for one task occurrence.
///
/// Transitions:
///   New → UnderReview           (photo submitted)
///   New → NotSubmitted          (task date elapsed, external scheduler)
///   UnderReview → Approved | Rejected  (staff decision)
///   Rejected → UnderReview      (resubmission, attempt_number += 1, capped)
/// Approved and NotSubmitted are terminal. Rejected becomes terminal once
/// the attempt limit is reached — that cap lives on the engine, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTaskStatus {
    New,
    UnderReview,
    Approved,
    Rejected,
    NotSubmitted,
}

impl UserTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NotSubmitted => "not_submitted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "under_review" => Some(Self::UnderReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "not_submitted" => Some(Self::NotSubmitted),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::NotSubmitted)
    }

    /// Explicit allowed-transitions table.
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::New, Self::UnderReview)
                | (Self::New, Self::NotSubmitted)
                | (Self::UnderReview, Self::Approved)
                | (Self::UnderReview, Self::Rejected)
                | (Self::Rejected, Self::UnderReview)
        )
    }
}

impl std::fmt::Display for UserTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Staff decision on a submitted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved,
    Rejected,
}

// ── Notification intent ───────────────────────────────────────

/// What the user should be told after a committed transition.
///
/// Returned by the pure transition methods so the state machine is testable
/// without a live channel; the engines dispatch it best-effort afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Approved,
    Rejected,
    Blocked,
}

// ── Entities ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub city: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: ShiftStatus,
    pub title: String,
    /// Ordinal of the shift, used by the renderer for report file naming.
    pub sequence_number: i32,
    pub started_at: NaiveDate,
    pub finished_at: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: String,
    /// What the proof photo must show, when the task prescribes it.
    pub photo_subject: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

impl Photo {
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub shift_id: Uuid,
    pub status: RequestStatus,
}

impl Request {
    pub fn new(user_id: Uuid, shift_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id,
            shift_id,
            status: RequestStatus::Pending,
        }
    }

    /// Apply a staff decision (or the blocking policy) to this request.
    ///
    /// Re-applying the current status fails with `AlreadyReviewed`; anything
    /// outside the allowed-transitions table fails with `InvalidTransition`.
    pub fn review(&mut self, new_status: RequestStatus) -> Result<Notification, RotaError> {
        if new_status == self.status {
            return Err(RotaError::AlreadyReviewed);
        }
        if !self.status.can_transition(new_status) {
            return Err(RotaError::InvalidTransition {
                entity: "request",
                from: self.status.to_string(),
                to: new_status.to_string(),
            });
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(match new_status {
            RequestStatus::Approved => Notification::Approved,
            RequestStatus::Blocked => Notification::Blocked,
            // Pending is unreachable here — no transition leads back to it.
            RequestStatus::Rejected | RequestStatus::Pending => Notification::Rejected,
        })
    }
}

/// One user's attempt record for one task occurrence on one date.
///
/// Never re-created for an existing (user, task, task_date) key — always
/// updated in place. Soft-deleted when a shift or task is retired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTask {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub shift_id: Uuid,
    pub task_id: Uuid,
    pub task_date: NaiveDate,
    pub status: UserTaskStatus,
    /// Zero-based; incremented only on a Rejected → UnderReview resubmission.
    pub attempt_number: i32,
    pub deleted: bool,
    pub photo_id: Option<Uuid>,
}

impl UserTask {
    pub fn new(user_id: Uuid, shift_id: Uuid, task_id: Uuid, task_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id,
            shift_id,
            task_id,
            task_date,
            status: UserTaskStatus::New,
            attempt_number: 0,
            deleted: false,
            photo_id: None,
        }
    }

    /// Attach a proof photo and move to UnderReview.
    ///
    /// Legal from New (first attempt) or Rejected (resubmission). A
    /// resubmission replaces the photo reference and increments the attempt
    /// number; once `attempt_number + 1` reaches the limit the occurrence is
    /// closed and further submissions fail with `AttemptLimitExceeded`.
    pub fn submit(&mut self, photo_id: Uuid, attempt_limit: i32) -> Result<(), RotaError> {
        match self.status {
            UserTaskStatus::New => {}
            UserTaskStatus::Rejected => {
                if self.attempt_number + 1 >= attempt_limit {
                    return Err(RotaError::AttemptLimitExceeded {
                        limit: attempt_limit,
                    });
                }
                self.attempt_number += 1;
            }
            other => {
                return Err(RotaError::InvalidTransition {
                    entity: "user_task",
                    from: other.to_string(),
                    to: UserTaskStatus::UnderReview.to_string(),
                });
            }
        }
        self.status = UserTaskStatus::UnderReview;
        self.photo_id = Some(photo_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the staff decision. Legal only from UnderReview.
    pub fn decide(&mut self, outcome: ReviewOutcome) -> Result<Notification, RotaError> {
        let (to, note) = match outcome {
            ReviewOutcome::Approved => (UserTaskStatus::Approved, Notification::Approved),
            ReviewOutcome::Rejected => (UserTaskStatus::Rejected, Notification::Rejected),
        };
        if !self.status.can_transition(to) {
            return Err(RotaError::InvalidTransition {
                entity: "user_task",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(note)
    }

    /// Close out an occurrence whose task date elapsed with no submission.
    /// Driven by the external scheduler; legal only from New.
    pub fn mark_not_submitted(&mut self) -> Result<(), RotaError> {
        if !self.status.can_transition(UserTaskStatus::NotSubmitted) {
            return Err(RotaError::InvalidTransition {
                entity: "user_task",
                from: self.status.to_string(),
                to: UserTaskStatus::NotSubmitted.to_string(),
            });
        }
        self.status = UserTaskStatus::NotSubmitted;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// True once the occurrence is Rejected with no attempts left.
    pub fn out_of_attempts(&self, attempt_limit: i32) -> bool {
        self.status == UserTaskStatus::Rejected && self.attempt_number + 1 >= attempt_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user_task() -> UserTask {
        UserTask::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
        )
    }

    #[test]
    fn status_round_trip() {
        for s in [
            UserTaskStatus::New,
            UserTaskStatus::UnderReview,
            UserTaskStatus::Approved,
            UserTaskStatus::Rejected,
            UserTaskStatus::NotSubmitted,
        ] {
            assert_eq!(UserTaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(UserTaskStatus::parse("bogus"), None);
    }

    #[test]
    fn request_status_transition_table() {
        use RequestStatus::*;
        assert!(Pending.can_transition(Approved));
        assert!(Pending.can_transition(Rejected));
        assert!(Approved.can_transition(Blocked));
        assert!(!Blocked.can_transition(Approved));
        assert!(!Rejected.can_transition(Approved));
        assert!(!Pending.can_transition(Blocked));
    }

    #[test]
    fn submit_from_new_keeps_attempt_zero() {
        let mut ut = sample_user_task();
        ut.submit(Uuid::new_v4(), DEFAULT_ATTEMPT_LIMIT).unwrap();
        assert_eq!(ut.status, UserTaskStatus::UnderReview);
        assert_eq!(ut.attempt_number, 0);
        assert!(ut.photo_id.is_some());
    }

    #[test]
    fn resubmit_after_rejection_increments_attempt() {
        let mut ut = sample_user_task();
        ut.submit(Uuid::new_v4(), DEFAULT_ATTEMPT_LIMIT).unwrap();
        ut.decide(ReviewOutcome::Rejected).unwrap();
        let first_photo = ut.photo_id;
        ut.submit(Uuid::new_v4(), DEFAULT_ATTEMPT_LIMIT).unwrap();
        assert_eq!(ut.attempt_number, 1);
        assert_ne!(ut.photo_id, first_photo);
    }

    #[test]
    fn submit_on_approved_is_invalid() {
        let mut ut = sample_user_task();
        ut.submit(Uuid::new_v4(), DEFAULT_ATTEMPT_LIMIT).unwrap();
        ut.decide(ReviewOutcome::Approved).unwrap();
        let err = ut
            .submit(Uuid::new_v4(), DEFAULT_ATTEMPT_LIMIT)
            .unwrap_err();
        assert!(matches!(err, RotaError::InvalidTransition { .. }));
    }

    #[test]
    fn submit_past_attempt_limit_fails() {
        let mut ut = sample_user_task();
        // Three rejected attempts (0, 1, 2) exhaust a limit of 3.
        for _ in 0..3 {
            ut.submit(Uuid::new_v4(), 3).unwrap();
            ut.decide(ReviewOutcome::Rejected).unwrap();
        }
        assert!(ut.out_of_attempts(3));
        let err = ut.submit(Uuid::new_v4(), 3).unwrap_err();
        assert!(matches!(err, RotaError::AttemptLimitExceeded { limit: 3 }));
        // Attempt number untouched by the failed submit.
        assert_eq!(ut.attempt_number, 2);
    }

    #[test]
    fn decide_outside_under_review_is_invalid() {
        let mut ut = sample_user_task();
        let err = ut.decide(ReviewOutcome::Approved).unwrap_err();
        assert!(matches!(err, RotaError::InvalidTransition { .. }));
    }

    #[test]
    fn mark_not_submitted_only_from_new() {
        let mut ut = sample_user_task();
        ut.mark_not_submitted().unwrap();
        assert_eq!(ut.status, UserTaskStatus::NotSubmitted);

        let mut submitted = sample_user_task();
        submitted.submit(Uuid::new_v4(), DEFAULT_ATTEMPT_LIMIT).unwrap();
        assert!(submitted.mark_not_submitted().is_err());
    }

    #[test]
    fn request_review_same_status_already_reviewed() {
        let mut req = Request::new(Uuid::new_v4(), Uuid::new_v4());
        req.review(RequestStatus::Approved).unwrap();
        let err = req.review(RequestStatus::Approved).unwrap_err();
        assert!(matches!(err, RotaError::AlreadyReviewed));
    }

    #[test]
    fn request_review_notification_intents() {
        let mut req = Request::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            req.review(RequestStatus::Approved).unwrap(),
            Notification::Approved
        );
        assert_eq!(
            req.review(RequestStatus::Blocked).unwrap(),
            Notification::Blocked
        );

        let mut rejected = Request::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            rejected.review(RequestStatus::Rejected).unwrap(),
            Notification::Rejected
        );
    }

    #[test]
    fn blocked_request_is_terminal() {
        let mut req = Request::new(Uuid::new_v4(), Uuid::new_v4());
        req.review(RequestStatus::Approved).unwrap();
        req.review(RequestStatus::Blocked).unwrap();
        let err = req.review(RequestStatus::Approved).unwrap_err();
        assert!(matches!(err, RotaError::InvalidTransition { .. }));
        assert_eq!(req.status, RequestStatus::Blocked);
    }
}
