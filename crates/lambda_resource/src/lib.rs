//! Pipeline resource adapters for a deployed function.
//!
//! `lambda_resource_core` owns the request/response contract and the
//! pipeline-facing process plumbing. This crate supplies the function
//! management client, the three command handlers and log setup.

pub mod adapters;
pub mod handlers;
pub mod logging;
pub mod resource;

#[cfg(test)]
mod test_helpers;
