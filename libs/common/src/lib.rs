//! Common library for the ReFile services
//!
//! This crate provides shared functionality used by the ReFile API,
//! including PostgreSQL connectivity, schema migrations and the database
//! error type.
//!
//! ```rust,no_run
//! use refile_common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
