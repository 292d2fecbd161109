//! API handlers module

pub mod health;
pub mod jobs;
pub mod participants;
pub mod posts;
pub mod ranks;
