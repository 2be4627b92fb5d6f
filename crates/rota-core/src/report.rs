//! Aggregation engine — per-task and per-shift statistics.
//!
//! Pure folds over committed state: the store queries provide a snapshot and
//! the row math is a plain function of it, so for fixed input the output is
//! byte-for-byte deterministic. The ordered row sequence (header semantics,
//! per-task rows in definition order, footer of totals) is the whole
//! contract with the external renderer — no formatting lives here.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ports::{RequestStore, Result, ShiftStore, TaskStore, UserTaskStore};
use crate::types::{Task, UserTask, UserTaskStatus, DEFAULT_ATTEMPT_LIMIT};

/// Column labels for the renderer, index-aligned with `TaskReportRow` fields.
pub const TASK_REPORT_COLUMNS: [&str; 6] = [
    "Task",
    "Approved on first try",
    "Approved on second try",
    "Approved on third try",
    "Rejected, no more attempts",
    "Not submitted",
];

pub const FOOTER_LABEL: &str = "Total";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReportRow {
    pub description: String,
    pub approved_first_try: i64,
    pub approved_second_try: i64,
    pub approved_third_try: i64,
    pub rejected_no_attempts_left: i64,
    pub not_submitted: i64,
}

impl TaskReportRow {
    fn empty(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            approved_first_try: 0,
            approved_second_try: 0,
            approved_third_try: 0,
            rejected_no_attempts_left: 0,
            not_submitted: 0,
        }
    }

    /// Sum of all counted outcomes in this row.
    pub fn total(&self) -> i64 {
        self.approved_first_try
            + self.approved_second_try
            + self.approved_third_try
            + self.rejected_no_attempts_left
            + self.not_submitted
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// Metadata only — never feeds into the row data.
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<TaskReportRow>,
    pub footer: TaskReportRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShiftReport {
    pub shift_id: Uuid,
    pub shift_title: String,
    /// Ordinal for the renderer's file naming.
    pub shift_sequence_number: i32,
    /// Headcount of approved participants, joined from the request history.
    pub approved_participants: i64,
    pub report: TaskReport,
}

/// Classify finished occurrences into report buckets.
///
/// Open occurrences (New, UnderReview, Rejected with attempts left) are not
/// counted anywhere; a Rejected occurrence past the attempt cap is "rejected,
/// no more attempts" — deliberately distinct from "not submitted".
pub fn fold_task_rows(
    tasks: &[Task],
    user_tasks: &[UserTask],
    attempt_limit: i32,
) -> Vec<TaskReportRow> {
    let mut by_task: HashMap<Uuid, TaskReportRow> = tasks
        .iter()
        .map(|t| (t.id, TaskReportRow::empty(&t.description)))
        .collect();

    for ut in user_tasks.iter().filter(|ut| !ut.deleted) {
        let Some(row) = by_task.get_mut(&ut.task_id) else {
            continue;
        };
        match ut.status {
            UserTaskStatus::Approved => match ut.attempt_number {
                0 => row.approved_first_try += 1,
                1 => row.approved_second_try += 1,
                2 => row.approved_third_try += 1,
                _ => {}
            },
            UserTaskStatus::Rejected if ut.attempt_number + 1 >= attempt_limit => {
                row.rejected_no_attempts_left += 1;
            }
            UserTaskStatus::NotSubmitted => row.not_submitted += 1,
            _ => {}
        }
    }

    // Rows come out in task definition order, not map order.
    tasks
        .iter()
        .filter_map(|t| by_task.remove(&t.id))
        .collect()
}

/// Footer row: aggregate totals over the data rows.
pub fn total_row(rows: &[TaskReportRow]) -> TaskReportRow {
    let mut footer = TaskReportRow::empty(FOOTER_LABEL);
    for row in rows {
        footer.approved_first_try += row.approved_first_try;
        footer.approved_second_try += row.approved_second_try;
        footer.approved_third_try += row.approved_third_try;
        footer.rejected_no_attempts_left += row.rejected_no_attempts_left;
        footer.not_submitted += row.not_submitted;
    }
    footer
}

pub struct ReportEngine {
    tasks: Arc<dyn TaskStore>,
    shifts: Arc<dyn ShiftStore>,
    user_tasks: Arc<dyn UserTaskStore>,
    requests: Arc<dyn RequestStore>,
    attempt_limit: i32,
}

impl ReportEngine {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        shifts: Arc<dyn ShiftStore>,
        user_tasks: Arc<dyn UserTaskStore>,
        requests: Arc<dyn RequestStore>,
    ) -> Self {
        Self {
            tasks,
            shifts,
            user_tasks,
            requests,
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
        }
    }

    pub fn with_attempt_limit(mut self, limit: i32) -> Self {
        self.attempt_limit = limit;
        self
    }

    /// Full-system statistics: one row per task definition over all shifts.
    pub async fn task_report(&self) -> Result<TaskReport> {
        let tasks = self.tasks.list().await?;
        let user_tasks = self.user_tasks.list_all(false).await?;
        let rows = fold_task_rows(&tasks, &user_tasks, self.attempt_limit);
        let footer = total_row(&rows);
        Ok(TaskReport {
            generated_at: Utc::now(),
            rows,
            footer,
        })
    }

    /// Statistics for a single task definition: one data row plus footer.
    pub async fn task_report_for(&self, task_id: Uuid) -> Result<TaskReport> {
        let task = self.tasks.get(task_id).await?;
        let user_tasks = self.user_tasks.list_for_task(task_id, false).await?;
        let rows = fold_task_rows(std::slice::from_ref(&task), &user_tasks, self.attempt_limit);
        let footer = total_row(&rows);
        Ok(TaskReport {
            generated_at: Utc::now(),
            rows,
            footer,
        })
    }

    /// Per-shift statistics plus the approved-participant headcount.
    pub async fn shift_report(&self, shift_id: Uuid) -> Result<ShiftReport> {
        let shift = self.shifts.get(shift_id).await?;
        let tasks = self.tasks.list().await?;
        let user_tasks = self.user_tasks.list_for_shift(shift_id, false).await?;
        let approved = self.requests.approved_user_ids(shift_id).await?;

        let rows = fold_task_rows(&tasks, &user_tasks, self.attempt_limit);
        let footer = total_row(&rows);
        Ok(ShiftReport {
            shift_id,
            shift_title: shift.title,
            shift_sequence_number: shift.sequence_number,
            approved_participants: approved.len() as i64,
            report: TaskReport {
                generated_at: Utc::now(),
                rows,
                footer,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::ports::LoggingChannel;
    use crate::review::ReviewEngine;
    use crate::types::{Request, RequestStatus, ReviewOutcome, User};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    fn sample_task(description: &str) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            description: description.into(),
            photo_subject: None,
        }
    }

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: "Olga".into(),
            surname: "Orlova".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2000, 9, 9).unwrap(),
            city: "Perm".into(),
            phone_number: "+7911000000".into(),
        }
    }

    fn finished(task_id: Uuid, status: UserTaskStatus, attempt: i32, day: u32) -> UserTask {
        let mut ut = UserTask::new(Uuid::new_v4(), Uuid::new_v4(), task_id, date(day));
        ut.status = status;
        ut.attempt_number = attempt;
        ut
    }

    #[test]
    fn fold_buckets_by_attempt_and_outcome() {
        let task = sample_task("Water the garden");
        let uts = vec![
            finished(task.id, UserTaskStatus::Approved, 0, 1),
            finished(task.id, UserTaskStatus::Approved, 0, 2),
            finished(task.id, UserTaskStatus::Approved, 1, 3),
            finished(task.id, UserTaskStatus::Approved, 2, 4),
            finished(task.id, UserTaskStatus::Rejected, 2, 5),
            finished(task.id, UserTaskStatus::NotSubmitted, 0, 6),
            // Open occurrences stay uncounted.
            finished(task.id, UserTaskStatus::Rejected, 0, 7),
            finished(task.id, UserTaskStatus::UnderReview, 0, 8),
            finished(task.id, UserTaskStatus::New, 0, 9),
        ];
        let rows = fold_task_rows(&[task], &uts, 3);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.approved_first_try, 2);
        assert_eq!(row.approved_second_try, 1);
        assert_eq!(row.approved_third_try, 1);
        assert_eq!(row.rejected_no_attempts_left, 1);
        assert_eq!(row.not_submitted, 1);
    }

    #[test]
    fn fold_skips_soft_deleted_rows() {
        let task = sample_task("Sweep the yard");
        let mut gone = finished(task.id, UserTaskStatus::Approved, 0, 1);
        gone.deleted = true;
        let rows = fold_task_rows(&[task], &[gone], 3);
        assert_eq!(rows[0].total(), 0);
    }

    #[test]
    fn closed_row_totals_match_closed_occurrence_count() {
        let task = sample_task("Feed the cats");
        let uts = vec![
            finished(task.id, UserTaskStatus::Approved, 0, 1),
            finished(task.id, UserTaskStatus::Approved, 1, 2),
            finished(task.id, UserTaskStatus::Rejected, 2, 3),
            finished(task.id, UserTaskStatus::NotSubmitted, 0, 4),
        ];
        let closed = uts.len() as i64;
        let rows = fold_task_rows(&[task], &uts, 3);
        assert_eq!(rows[0].total(), closed);
        assert_eq!(total_row(&rows).total(), closed);
    }

    #[test]
    fn rows_follow_task_definition_order() {
        let first = sample_task("A");
        let second = sample_task("B");
        let third = sample_task("C");
        let rows = fold_task_rows(&[first, second, third], &[], 3);
        let names: Vec<_> = rows.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn second_try_approval_counts_once() {
        let store = Arc::new(MemoryStore::new());
        let user = sample_user();
        store.insert_user(&user);
        let task = sample_task("Walk the dog");
        store.insert_task(&task);
        let shift_id = Uuid::new_v4();
        let ut = UserTask::new(user.id, shift_id, task.id, date(1));
        let id = ut.id;
        store.insert_user_task(&ut);

        let review = ReviewEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(LoggingChannel),
        );
        review.submit(id, "https://cdn.example/1.jpg").await.unwrap();
        review.decide(id, ReviewOutcome::Rejected).await.unwrap();
        review.submit(id, "https://cdn.example/2.jpg").await.unwrap();
        review.decide(id, ReviewOutcome::Approved).await.unwrap();

        let reports = ReportEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        let report = reports.task_report().await.unwrap();
        let row = &report.rows[0];
        assert_eq!(row.approved_first_try, 0);
        assert_eq!(row.approved_second_try, 1);
        assert_eq!(report.footer.total(), 1);
    }

    #[tokio::test]
    async fn single_task_report_ignores_other_tasks() {
        let store = Arc::new(MemoryStore::new());
        let task = sample_task("Rake the leaves");
        let other = sample_task("Clean windows");
        store.insert_task(&task);
        store.insert_task(&other);
        store.insert_user_task(&finished(task.id, UserTaskStatus::Approved, 0, 1));
        store.insert_user_task(&finished(other.id, UserTaskStatus::Approved, 0, 2));

        let reports = ReportEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        let report = reports.task_report_for(task.id).await.unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].description, "Rake the leaves");
        assert_eq!(report.footer.total(), 1);
    }

    #[tokio::test]
    async fn shift_report_joins_participant_headcount() {
        let store = Arc::new(MemoryStore::new());
        let shift_id = Uuid::new_v4();
        store.insert_shift_with(shift_id, "June shift", 4);
        let task = sample_task("Tidy the shed");
        store.insert_task(&task);

        for _ in 0..2 {
            let user = sample_user();
            store.insert_user(&user);
            let mut request = Request::new(user.id, shift_id);
            request.status = RequestStatus::Approved;
            store.insert_request(&request);
        }

        let mut ut = finished(task.id, UserTaskStatus::Approved, 0, 2);
        ut.shift_id = shift_id;
        store.insert_user_task(&ut);
        // A second occurrence in another shift must not leak in.
        store.insert_user_task(&finished(task.id, UserTaskStatus::Approved, 0, 3));

        let reports = ReportEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        let report = reports.shift_report(shift_id).await.unwrap();
        assert_eq!(report.shift_title, "June shift");
        assert_eq!(report.shift_sequence_number, 4);
        assert_eq!(report.approved_participants, 2);
        assert_eq!(report.report.rows[0].approved_first_try, 1);
    }
}
