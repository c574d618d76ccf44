//! Reservoir simulation dashboard client.
//!
//! Fetches precomputed chart payloads for a project, repairs whatever shape
//! they arrive in, and assembles them into a dashboard of independent slots.

pub mod assembler;
pub mod availability;
pub mod client;
pub mod config;
pub mod dataset;
pub mod format;
pub mod forms;
pub mod images;
pub mod logging;
pub mod payload;
pub mod render;
pub mod slots;
pub mod summary;
