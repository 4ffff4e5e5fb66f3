//! Services shared by front ends

mod database;

pub use database::DatabaseService;
