//! Bastion Core: domain models, the shared error type and the
//! repository contracts every other crate builds on.

pub mod error;
pub mod models;
pub mod repository;
