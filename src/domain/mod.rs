pub mod models;
pub mod occurrence;
pub mod time;
