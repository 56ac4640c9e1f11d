//! Engineer Bot - a worker that turns a GitHub issue into a pull request by
//! running a coding agent against a fresh checkout.
//!
//! Events arrive over HTTP, are queued, and run one at a time through the
//! [`engine::EngineerLoop`]. All durable state for the issue lives in a single
//! JSON file under the work root.

pub mod config;
pub mod engine;
pub mod git;
pub mod github;
pub mod persistence;
pub mod preflight;
pub mod process;
pub mod provider;
pub mod server;
pub mod status;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_utils;
