//! Google APIs, each behind its own cargo feature.

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "google-oauth")]
pub mod oauth;
#[cfg(feature = "google-sheets")]
pub mod sheets;
