//! Embedded SQL migrations
//!
//! Two databases are managed: the bank database (`bank.duckdb`) and the
//! event log (`logs.duckdb`). Each migration set is a list of
//! `(file name, sql)` pairs applied in order and recorded in
//! `sys_migrations`. The first entry of every set bootstraps that table.
//!
//! To add a migration, create `NNN_description.sql` in the matching
//! directory and append it to the list below.

/// Migrations for the bank database
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("bank/000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("bank/001_initial_schema.sql")),
];

/// Migrations for the event log database
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("log/000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("log/001_initial_schema.sql")),
];

/// Name of the bootstrap migration present in every set
pub const BOOTSTRAP_MIGRATION: &str = "000_migrations.sql";
