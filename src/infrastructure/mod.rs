pub mod calendar_feed;
pub mod error;
pub mod provider_client;
pub mod repository;
