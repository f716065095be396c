//! SOAR integrations
//!
//! Vendor API clients (`logic`), the actions and connectors the platform
//! invokes (`api`), and the shared HTTP and platform plumbing they sit on.

pub mod api;
pub mod config;
pub mod constants;
pub mod http;
pub mod logic;
pub mod platform;
