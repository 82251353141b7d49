//! PostgreSQL-backed [`noesis_repository::Repository`] implementation plus
//! the schema migration runner used by the `migrate` binary and by
//! integration tests that stand up a real database.

mod migrator;
mod pg_repository;

pub use migrator::{MigrationAction, MigrationError, MigrationStatus, Migrator};
pub use pg_repository::PgRepository;
