//! Password hashing parameters

use serde::{Deserialize, Serialize};

/// Default Argon2id parameters (OWASP minimum recommendation)
pub const DEFAULT_MEMORY_COST: u32 = 19456; // 19 MiB
pub const DEFAULT_TIME_COST: u32 = 2;
pub const DEFAULT_PARALLELISM: u32 = 1;

/// Argon2id cost parameters for password hashes
///
/// Only affects newly written hashes. Existing PHC strings carry their own
/// parameters and keep verifying after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argon2Params {
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_cost: DEFAULT_MEMORY_COST,
            time_cost: DEFAULT_TIME_COST,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}
