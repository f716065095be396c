//! API Module - the entry points the platform invokes
//!
//! One submodule per integration holding its actions, plus its connector
//! where it has one. `registry.rs` maps "<integration> <script>" names to them.

pub mod arcanna;
pub mod infoblox;
pub mod recorded_future;
pub mod registry;
pub mod telegram;
pub mod vectra_qux;

#[cfg(test)]
pub(crate) mod testing;
