//! In-memory store implementing every port trait.
//!
//! Backs the engine tests and local experiments; the Postgres adapter is the
//! production backend. Check-and-set semantics match the SQL adapter: an
//! update whose expected status no longer matches fails with
//! `ConflictingUpdate`, so races behave the same under test.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::RotaError;
use crate::ports::*;
use crate::types::*;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    shifts: HashMap<Uuid, Shift>,
    tasks: HashMap<Uuid, Task>,
    photos: HashMap<Uuid, Photo>,
    requests: HashMap<Uuid, Request>,
    user_tasks: HashMap<Uuid, UserTask>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Inherent insert/read helpers for test fixtures — the trait methods are
    // the production surface and stay unambiguous behind `dyn` objects.

    pub fn insert_user(&self, user: &User) {
        self.inner
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
    }

    pub fn insert_task(&self, task: &Task) {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .insert(task.id, task.clone());
    }

    pub fn insert_request(&self, request: &Request) {
        self.inner
            .lock()
            .unwrap()
            .requests
            .insert(request.id, request.clone());
    }

    pub fn insert_user_task(&self, user_task: &UserTask) {
        self.inner
            .lock()
            .unwrap()
            .user_tasks
            .insert(user_task.id, user_task.clone());
    }

    pub fn insert_shift_with(&self, id: Uuid, title: &str, sequence_number: i32) {
        let now = Utc::now();
        let shift = Shift {
            id,
            created_at: now,
            updated_at: now,
            status: ShiftStatus::Started,
            title: title.into(),
            sequence_number,
            started_at: now.date_naive(),
            finished_at: now.date_naive(),
        };
        self.inner.lock().unwrap().shifts.insert(id, shift);
    }

    pub fn user_task(&self, id: Uuid) -> Option<UserTask> {
        self.inner.lock().unwrap().user_tasks.get(&id).cloned()
    }

    pub fn request(&self, id: Uuid) -> Option<Request> {
        self.inner.lock().unwrap().requests.get(&id).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<User> {
        self.inner
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("user", id))
    }

    async fn get_or_none(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn create(&self, user: &User) -> Result<()> {
        self.insert_user(user);
        Ok(())
    }

    async fn update(&self, id: Uuid, user: &User) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&id) {
            return Err(not_found("user", id));
        }
        inner.users.insert(id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl ShiftStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Shift> {
        self.inner
            .lock()
            .unwrap()
            .shifts
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("shift", id))
    }

    async fn get_or_none(&self, id: Uuid) -> Result<Option<Shift>> {
        Ok(self.inner.lock().unwrap().shifts.get(&id).cloned())
    }

    async fn create(&self, shift: &Shift) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .shifts
            .insert(shift.id, shift.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, shift: &Shift) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.shifts.contains_key(&id) {
            return Err(not_found("shift", id));
        }
        inner.shifts.insert(id, shift.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Shift>> {
        let mut shifts: Vec<_> = self.inner.lock().unwrap().shifts.values().cloned().collect();
        shifts.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(shifts)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Task> {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("task", id))
    }

    async fn create(&self, task: &Task) -> Result<()> {
        self.insert_task(task);
        Ok(())
    }

    async fn update(&self, id: Uuid, task: &Task) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.tasks.contains_key(&id) {
            return Err(not_found("task", id));
        }
        inner.tasks.insert(id, task.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<_> = self.inner.lock().unwrap().tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }
}

#[async_trait]
impl PhotoStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Photo> {
        self.inner
            .lock()
            .unwrap()
            .photos
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("photo", id))
    }

    async fn create(&self, photo: &Photo) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .photos
            .insert(photo.id, photo.clone());
        Ok(())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Request> {
        self.request(id).ok_or_else(|| not_found("request", id))
    }

    async fn create(&self, request: &Request) -> Result<()> {
        self.insert_request(request);
        Ok(())
    }

    async fn update_status_checked(
        &self,
        id: Uuid,
        expected: RequestStatus,
        request: &Request,
    ) -> Result<Request> {
        let mut inner = self.inner.lock().unwrap();
        match inner.requests.get_mut(&id) {
            None => Err(not_found("request", id)),
            Some(existing) if existing.status != expected => Err(RotaError::ConflictingUpdate(
                format!("request {id} was updated concurrently"),
            )),
            Some(existing) => {
                *existing = request.clone();
                Ok(existing.clone())
            }
        }
    }

    async fn find_by_user_and_shift(
        &self,
        user_id: Uuid,
        shift_id: Uuid,
    ) -> Result<Option<Request>> {
        // At most one non-rejected request per (user, shift).
        Ok(self
            .inner
            .lock()
            .unwrap()
            .requests
            .values()
            .find(|r| {
                r.user_id == user_id
                    && r.shift_id == shift_id
                    && r.status != RequestStatus::Rejected
            })
            .cloned())
    }

    async fn approved_user_ids(&self, shift_id: Uuid) -> Result<Vec<Uuid>> {
        let mut ids: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .requests
            .values()
            .filter(|r| r.shift_id == shift_id && r.status == RequestStatus::Approved)
            .map(|r| r.user_id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl UserTaskStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<UserTask> {
        self.user_task(id).ok_or_else(|| not_found("user_task", id))
    }

    async fn get_or_none(&self, id: Uuid) -> Result<Option<UserTask>> {
        Ok(self.user_task(id))
    }

    async fn create(&self, user_task: &UserTask) -> Result<()> {
        self.insert_user_task(user_task);
        Ok(())
    }

    async fn create_all(&self, user_tasks: &[UserTask]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for ut in user_tasks {
            inner.user_tasks.insert(ut.id, ut.clone());
        }
        Ok(())
    }

    async fn update_checked(
        &self,
        id: Uuid,
        expected: UserTaskStatus,
        user_task: &UserTask,
    ) -> Result<UserTask> {
        let mut inner = self.inner.lock().unwrap();
        match inner.user_tasks.get_mut(&id) {
            None => Err(not_found("user_task", id)),
            Some(existing) if existing.status != expected => Err(RotaError::ConflictingUpdate(
                format!("user_task {id} was updated concurrently"),
            )),
            Some(existing) => {
                *existing = user_task.clone();
                Ok(existing.clone())
            }
        }
    }

    async fn windowed_status_count(
        &self,
        user_id: Uuid,
        window: i64,
        status: UserTaskStatus,
    ) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        let mut recent: Vec<_> = inner
            .user_tasks
            .values()
            .filter(|ut| ut.user_id == user_id && ut.status != UserTaskStatus::New && !ut.deleted)
            .collect();
        // task_date desc, created_at desc, id desc — the documented tie-break.
        recent.sort_by(|a, b| {
            b.task_date
                .cmp(&a.task_date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(recent
            .iter()
            .take(window as usize)
            .filter(|ut| ut.status == status)
            .count() as i64)
    }

    async fn ids_awaiting_review(&self) -> Result<Vec<Uuid>> {
        let mut ids: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .user_tasks
            .values()
            .filter(|ut| ut.status == UserTaskStatus::UnderReview && !ut.deleted)
            .map(|ut| ut.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn open_ids_for_date(
        &self,
        shift_id: Uuid,
        task_date: NaiveDate,
    ) -> Result<Vec<OpenUserTaskIds>> {
        let mut open: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .user_tasks
            .values()
            .filter(|ut| {
                ut.shift_id == shift_id
                    && ut.task_date == task_date
                    && !ut.deleted
                    && matches!(
                        ut.status,
                        UserTaskStatus::New | UserTaskStatus::UnderReview
                    )
            })
            .map(|ut| OpenUserTaskIds {
                user_task_id: ut.id,
                user_id: ut.user_id,
                task_id: ut.task_id,
            })
            .collect();
        open.sort_by_key(|ids| ids.user_task_id);
        Ok(open)
    }

    async fn list_for_task(&self, task_id: Uuid, include_deleted: bool) -> Result<Vec<UserTask>> {
        Ok(self.filter_tasks(include_deleted, |ut| ut.task_id == task_id))
    }

    async fn list_for_shift(
        &self,
        shift_id: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<UserTask>> {
        Ok(self.filter_tasks(include_deleted, |ut| ut.shift_id == shift_id))
    }

    async fn list_all(&self, include_deleted: bool) -> Result<Vec<UserTask>> {
        Ok(self.filter_tasks(include_deleted, |_| true))
    }
}

impl MemoryStore {
    fn filter_tasks(&self, include_deleted: bool, pred: impl Fn(&UserTask) -> bool) -> Vec<UserTask> {
        let mut rows: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .user_tasks
            .values()
            .filter(|ut| (include_deleted || !ut.deleted) && pred(ut))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.task_date.cmp(&b.task_date).then(a.id.cmp(&b.id)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    #[tokio::test]
    async fn stale_expected_status_loses_the_race() {
        let store = MemoryStore::new();
        let mut ut = UserTask::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), date(1));
        ut.status = UserTaskStatus::UnderReview;
        store.insert_user_task(&ut);

        // First reviewer commits an approval.
        let mut approved = ut.clone();
        approved.status = UserTaskStatus::Approved;
        UserTaskStore::update_checked(&store, ut.id, UserTaskStatus::UnderReview, &approved)
            .await
            .unwrap();

        // Second reviewer raced with a rejection off the same snapshot.
        let mut rejected = ut.clone();
        rejected.status = UserTaskStatus::Rejected;
        let err =
            UserTaskStore::update_checked(&store, ut.id, UserTaskStatus::UnderReview, &rejected)
                .await
                .unwrap_err();
        assert!(matches!(err, RotaError::ConflictingUpdate(_)));
        assert_eq!(
            store.user_task(ut.id).unwrap().status,
            UserTaskStatus::Approved
        );
    }

    #[tokio::test]
    async fn update_checked_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let ut = UserTask::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), date(1));
        let err = UserTaskStore::update_checked(&store, ut.id, UserTaskStatus::New, &ut)
            .await
            .unwrap_err();
        assert!(matches!(err, RotaError::NotFound(_)));
    }

    #[tokio::test]
    async fn windowed_count_tie_break_is_deterministic() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        // Three occurrences sharing one task_date; only created_at/id order
        // decides which fall inside a window of 2.
        let base = Utc::now();
        for (offset_secs, status) in [
            (0, UserTaskStatus::Rejected),
            (10, UserTaskStatus::Approved),
            (20, UserTaskStatus::Approved),
        ] {
            let mut ut = UserTask::new(user_id, Uuid::new_v4(), Uuid::new_v4(), date(5));
            ut.created_at = base + chrono::Duration::seconds(offset_secs);
            ut.status = status;
            store.insert_user_task(&ut);
        }
        // Newest two by created_at are both Approved.
        let count = UserTaskStore::windowed_status_count(
            &store,
            user_id,
            2,
            UserTaskStatus::Rejected,
        )
        .await
        .unwrap();
        assert_eq!(count, 0);
        let approved = UserTaskStore::windowed_status_count(
            &store,
            user_id,
            2,
            UserTaskStatus::Approved,
        )
        .await
        .unwrap();
        assert_eq!(approved, 2);
    }

    #[tokio::test]
    async fn list_scans_respect_include_deleted() {
        let store = MemoryStore::new();
        let task_id = Uuid::new_v4();
        let mut live = UserTask::new(Uuid::new_v4(), Uuid::new_v4(), task_id, date(1));
        live.status = UserTaskStatus::Approved;
        store.insert_user_task(&live);
        let mut gone = UserTask::new(Uuid::new_v4(), Uuid::new_v4(), task_id, date(2));
        gone.deleted = true;
        store.insert_user_task(&gone);

        let visible = UserTaskStore::list_for_task(&store, task_id, false)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        let all = UserTaskStore::list_for_task(&store, task_id, true)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
