//! Migration service - applies embedded schema migrations
//!
//! Every applied migration is recorded in `sys_migrations`, so running the
//! service twice is a no-op.

use duckdb::Connection;

use crate::domain::result::Result;
use crate::migrations::{BOOTSTRAP_MIGRATION, MIGRATIONS};

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Applies one migration set to one connection
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [(&'static str, &'static str)],
}

impl<'a> MigrationService<'a> {
    /// Migration service for the bank database
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_migrations(conn, MIGRATIONS)
    }

    /// Migration service for an arbitrary migration set (e.g. the event log)
    pub fn with_migrations(
        conn: &'a Connection,
        migrations: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { conn, migrations }
    }

    /// Run all pending migrations
    ///
    /// Bootstraps `sys_migrations` when missing, then applies every
    /// unrecorded migration in order.
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let mut newly_applied = Vec::new();

        let bootstrap_ran = if !self.migrations_table_exists() {
            match self.migrations.iter().find(|(n, _)| *n == BOOTSTRAP_MIGRATION) {
                Some((name, sql)) => {
                    self.conn.execute_batch(sql)?;
                    self.record_migration(name)?;
                    newly_applied.push(name.to_string());
                    true
                }
                None => false,
            }
        } else {
            false
        };

        let applied_set = self.get_applied()?;
        let already_applied = if bootstrap_ran {
            applied_set.len().saturating_sub(1)
        } else {
            applied_set.len()
        };

        for (name, sql) in self.migrations.iter() {
            if *name == BOOTSTRAP_MIGRATION || applied_set.iter().any(|a| a == name) {
                continue;
            }
            self.conn.execute_batch(sql)?;
            self.record_migration(name)?;
            newly_applied.push(name.to_string());
        }

        Ok(MigrationResult {
            applied: newly_applied,
            already_applied,
        })
    }

    fn migrations_table_exists(&self) -> bool {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count > 0)
            .unwrap_or(false)
    }

    /// Names of applied migrations
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for name in names {
            result.push(name?);
        }
        Ok(result)
    }

    /// Names of migrations not yet applied
    pub fn get_pending(&self) -> Result<Vec<String>> {
        let applied = self.get_applied()?;
        Ok(self
            .migrations
            .iter()
            .filter(|(name, _)| !applied.iter().any(|a| a == name))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn record_migration(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [name],
        )?;
        Ok(())
    }
}
