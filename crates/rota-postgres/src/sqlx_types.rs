//! Row types bridging Postgres and the domain entities.
//!
//! Status columns are Postgres enums; they are selected `::text` and parsed
//! through the domain `parse` functions so the adapter never depends on
//! enum declaration order.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use rota_core::types::*;

#[derive(Debug, FromRow)]
pub struct PgUserRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub city: String,
    pub phone_number: String,
}

impl From<PgUserRow> for User {
    fn from(r: PgUserRow) -> Self {
        User {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            name: r.name,
            surname: r.surname,
            date_of_birth: r.date_of_birth,
            city: r.city,
            phone_number: r.phone_number,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct PgShiftRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: String,
    pub title: String,
    pub sequence_number: i32,
    pub started_at: NaiveDate,
    pub finished_at: NaiveDate,
}

impl TryFrom<PgShiftRow> for Shift {
    type Error = String;

    fn try_from(r: PgShiftRow) -> Result<Self, Self::Error> {
        Ok(Shift {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            status: ShiftStatus::parse(&r.status)
                .ok_or_else(|| format!("unknown shift status {:?}", r.status))?,
            title: r.title,
            sequence_number: r.sequence_number,
            started_at: r.started_at,
            finished_at: r.finished_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PgTaskRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: String,
    pub photo_subject: Option<String>,
}

impl From<PgTaskRow> for Task {
    fn from(r: PgTaskRow) -> Self {
        Task {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            description: r.description,
            photo_subject: r.photo_subject,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct PgPhotoRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

impl From<PgPhotoRow> for Photo {
    fn from(r: PgPhotoRow) -> Self {
        Photo {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            url: r.url,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct PgRequestRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub shift_id: Uuid,
    pub status: String,
}

impl TryFrom<PgRequestRow> for Request {
    type Error = String;

    fn try_from(r: PgRequestRow) -> Result<Self, Self::Error> {
        Ok(Request {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            user_id: r.user_id,
            shift_id: r.shift_id,
            status: RequestStatus::parse(&r.status)
                .ok_or_else(|| format!("unknown request status {:?}", r.status))?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PgUserTaskRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub shift_id: Uuid,
    pub task_id: Uuid,
    pub task_date: NaiveDate,
    pub status: String,
    pub attempt_number: i32,
    pub deleted: bool,
    pub photo_id: Option<Uuid>,
}

impl TryFrom<PgUserTaskRow> for UserTask {
    type Error = String;

    fn try_from(r: PgUserTaskRow) -> Result<Self, Self::Error> {
        Ok(UserTask {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            user_id: r.user_id,
            shift_id: r.shift_id,
            task_id: r.task_id,
            task_date: r.task_date,
            status: UserTaskStatus::parse(&r.status)
                .ok_or_else(|| format!("unknown user_task status {:?}", r.status))?,
            attempt_number: r.attempt_number,
            deleted: r.deleted,
            photo_id: r.photo_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_task_row_parses_status() {
        let now = Utc::now();
        let row = PgUserTaskRow {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id: Uuid::new_v4(),
            shift_id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            task_date: NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            status: "under_review".into(),
            attempt_number: 1,
            deleted: false,
            photo_id: None,
        };
        let ut = UserTask::try_from(row).unwrap();
        assert_eq!(ut.status, UserTaskStatus::UnderReview);
        assert_eq!(ut.attempt_number, 1);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let now = Utc::now();
        let row = PgRequestRow {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id: Uuid::new_v4(),
            shift_id: Uuid::new_v4(),
            status: "limbo".into(),
        };
        assert!(Request::try_from(row).is_err());
    }
}
