#![forbid(unsafe_code)]

pub mod backends;
pub mod cli;
pub mod commands;
