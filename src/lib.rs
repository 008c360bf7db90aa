//! Threads saved-posts archiver library.
//!
//! Harvests a user's saved posts from the infinite-scroll saved-posts page
//! using a headless browser, extracts structured records from the unstable
//! markup, and merges them into a checkpointed, backed-up JSON archive.

pub mod browser;
pub mod config;
pub mod cookies;
pub mod extract;
pub mod harvest;
pub mod model;
pub mod selectors;
pub mod store;
