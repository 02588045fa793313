//! Account pool for rate-limited platform access
//!
//! Turns the accounts in `CredentialStore` into request slots. The activator
//! validates stored tokens and marks each account `active` or `faulty`; the
//! rotator hands out `active` accounts one lease at a time, spreading load
//! and keeping rate-limited accounts out of rotation until their cooldown
//! has elapsed.
//!
//! Account lifecycle inside the pool:
//! 1. `Activator::activate_all` → unchecked/faulty accounts become active or faulty
//! 2. `Rotator::sync` → active accounts join rotation as `Ready`
//! 3. `Rotator::acquire` → least-recently-used ready account is leased
//! 4. `Rotator::release` with `RateLimited` → `CoolingDown` for the policy window
//! 5. `Rotator::release` with `AuthFailed` → `Disabled`, store marks it faulty
//! 6. Cooldown expires → automatic transition back to `Ready`

pub mod activator;
pub mod cooldown;
pub mod error;
pub mod rotator;

pub use activator::{ActivationReport, Activator};
pub use cooldown::CooldownPolicy;
pub use error::{Error, Result};
pub use rotator::{Eligibility, Lease, PoolCounts, RequestOutcome, Rotator};
