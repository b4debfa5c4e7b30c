//! SQLite database setup.

pub mod schema;

pub use schema::initialize_database;
