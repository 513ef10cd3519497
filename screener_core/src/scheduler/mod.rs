//! Wall-clock triggers: the fine-grained pipeline tick and the coarse token sweep.

pub mod cron;
pub mod guard;
pub mod runner;
