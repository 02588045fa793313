//! Durable account storage for the follower harvester
//!
//! One record per pool account: identity, session tokens, health status and
//! usage counters. The store is a JSON file written atomically on every
//! mutation and is the only state that survives a restart.
//!
//! Account lifecycle:
//! 1. `add` (or `import`) stores the record as `unchecked`, replacing any
//!    previous record with the same username
//! 2. An activation pass marks it `active` or `faulty`
//! 3. Every request it serves bumps `total_requests` / `last_used_at`
//! 4. A hard failure marks it `faulty` until the next activation pass
//! 5. Only an explicit `remove` deletes it

pub mod account;
pub mod error;
pub mod import;
pub mod store;

pub use account::{Account, AccountStatus, StatusCounts};
pub use error::{Error, Result};
pub use import::{ImportLine, SkippedLine, parse_accounts_file};
pub use store::CredentialStore;
