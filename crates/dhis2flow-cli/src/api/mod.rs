//! API client module
//!
//! HTTP client for the DHIS2 Web API.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::Dhis2Client;
