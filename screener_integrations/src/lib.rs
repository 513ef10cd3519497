//! Concrete HTTP backends for the screener seams: Google OAuth token exchange,
//! Google Sheets values read/append, and Gemini `generateContent`.

pub mod google;
mod http;
mod test_support;
