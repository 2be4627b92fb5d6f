//! seed — wipe the rota database and fill it with fake development data.
//!
//! Reads config from env vars:
//!   ROTA_DATABASE_URL — Postgres connection string (required)
//!   ROTA_SEED_COUNT   — volunteers/requests per shift (default: 10)
//!
//! Destructive: truncates every table after an interactive confirmation.

use std::io::{self, Write};

use chrono::{Duration, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use rota_core::ports::{
    PhotoStore, RequestStore, ShiftStore, TaskStore, UserStore, UserTaskStore,
};
use rota_core::types::*;
use rota_postgres::{
    PgPhotoStore, PgRequestStore, PgShiftStore, PgTaskStore, PgUserStore, PgUserTaskStore,
};

const FIRST_NAMES: &[&str] = &[
    "Anna", "Boris", "Clara", "Dmitri", "Elena", "Felix", "Galina", "Hugo", "Inga", "Jonas",
];
const SURNAMES: &[&str] = &[
    "Smirnov", "Keller", "Orlova", "Bauer", "Petrov", "Vogel", "Ivanova", "Richter", "Sokolov",
    "Weiss",
];
const CITIES: &[&str] = &["Berlin", "Hamburg", "Leipzig", "Dresden", "Munich"];

const TASK_DESCRIPTIONS: &[(&str, &str)] = &[
    ("Water the community garden beds", "watering can in use"),
    ("Sort donated clothing by size", "sorted clothing piles"),
    ("Walk a shelter dog for 30 minutes", "dog on a leash outdoors"),
    ("Read aloud at the retirement home", "open book"),
    ("Collect litter in the local park", "filled trash bag"),
];

fn confirm_wipe() -> io::Result<bool> {
    print!("This will DELETE all existing data from every table. Continue? (y/n): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

async fn truncate_tables(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("TRUNCATE TABLE photos, requests, shifts, tasks, user_tasks, users")
        .execute(pool)
        .await?;
    Ok(())
}

async fn generate(pool: PgPool, count: usize) -> anyhow::Result<()> {
    let users = PgUserStore::new(pool.clone());
    let shifts = PgShiftStore::new(pool.clone());
    let tasks = PgTaskStore::new(pool.clone());
    let photos = PgPhotoStore::new(pool.clone());
    let requests = PgRequestStore::new(pool.clone());
    let user_tasks = PgUserTaskStore::new(pool);

    let mut rng = rand::thread_rng();
    let today = Utc::now().date_naive();

    let mut task_ids = Vec::new();
    for (description, subject) in TASK_DESCRIPTIONS {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            description: (*description).to_string(),
            photo_subject: Some((*subject).to_string()),
        };
        tasks.create(&task).await?;
        task_ids.push(task.id);
    }

    let now = Utc::now();
    let shift = Shift {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        status: ShiftStatus::Started,
        title: "Development shift".to_string(),
        sequence_number: 1,
        started_at: today - Duration::days(7),
        finished_at: today + Duration::days(14),
    };
    shifts.create(&shift).await?;

    for i in 0..count {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: FIRST_NAMES.choose(&mut rng).unwrap().to_string(),
            surname: SURNAMES.choose(&mut rng).unwrap().to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()
                + Duration::days(rng.gen_range(0..6000)),
            city: CITIES.choose(&mut rng).unwrap().to_string(),
            phone_number: format!("+49151{:07}", i),
        };
        users.create(&user).await?;

        let mut request = Request::new(user.id, shift.id);
        request.status = RequestStatus::Approved;
        requests.create(&request).await?;

        // A short history of already-reviewed occurrences plus today's open one.
        for days_ago in (1..=3).rev() {
            let task_id = *task_ids.choose(&mut rng).unwrap();
            let mut ut = UserTask::new(user.id, shift.id, task_id, today - Duration::days(days_ago));
            if rng.gen_bool(0.8) {
                let photo = Photo::new(format!("photos/{}.jpg", Uuid::new_v4()));
                photos.create(&photo).await?;
                ut.photo_id = Some(photo.id);
                ut.status = if rng.gen_bool(0.7) {
                    UserTaskStatus::Approved
                } else {
                    UserTaskStatus::Rejected
                };
                ut.attempt_number = rng.gen_range(0..2);
            } else {
                ut.status = UserTaskStatus::NotSubmitted;
            }
            user_tasks.create(&ut).await?;
        }
        let task_id = *task_ids.choose(&mut rng).unwrap();
        user_tasks
            .create(&UserTask::new(user.id, shift.id, task_id, today))
            .await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let database_url =
        std::env::var("ROTA_DATABASE_URL").expect("ROTA_DATABASE_URL must be set");
    let count: usize = std::env::var("ROTA_SEED_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    if !confirm_wipe()? {
        tracing::info!("aborted, nothing changed");
        return Ok(());
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("truncating tables");
    truncate_tables(&pool).await?;

    tracing::info!(count, "generating fake data");
    generate(pool, count).await?;

    tracing::info!("done");
    Ok(())
}
