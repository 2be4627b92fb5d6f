//! Postgres adapters for the rota-core port traits.
//!
//! Schema lives in the top-level `migrations/` directory; apply the files in
//! order with psql or your migration runner of choice. The `seed` binary
//! fills a development database with fake volunteers and shifts.

pub mod sqlx_types;
pub mod store;

pub use store::{
    PgPhotoStore, PgRequestStore, PgShiftStore, PgTaskStore, PgUserStore, PgUserTaskStore,
};
