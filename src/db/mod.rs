//! Database layer
//!
//! A SQLite store behind the `DatabasePool` trait, embedded migrations and one
//! repository per table. Access policies are evaluated by the repository
//! statements themselves, so a rejected write never touches the table.
//!
//! ```ignore
//! use timepass::config::DatabaseConfig;
//! use timepass::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod policy;
pub mod pool;
pub mod repositories;

pub use policy::{is_policy_violation, PolicyViolation};
pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqliteDatabase};
