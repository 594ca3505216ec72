pub mod config;
pub mod execution;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod registry;
pub mod repository;
pub mod sqlite;
