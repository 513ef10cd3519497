//! Credential Store & Token Refresher.
//!
//! - Identity records (access/refresh token pair + local expiry estimate) are kept in a
//!   `CredentialStore` keyed by account.
//! - `TokenRefresher` hands out access tokens, lazily exchanging the refresh token when
//!   the stored one has expired, and runs the periodic sweep that refreshes every
//!   identity unconditionally.

pub mod memory;
pub mod refresher;
pub mod sqlite;
pub mod traits;
