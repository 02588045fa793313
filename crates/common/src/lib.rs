//! Common types shared by the follower-harvest crates

mod error;
mod secret;
mod tokens;

pub use error::{Error, Result};
pub use secret::Secret;
pub use tokens::{TokenBundle, TokenError};
