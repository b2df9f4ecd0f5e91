//! Client-side helpers for driving the service from another process.

pub mod poller;

pub use poller::{Outcome, PollError, StatusPoller, StatusView};
