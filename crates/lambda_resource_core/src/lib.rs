//! Pipeline resource protocol primitives.
//!
//! This crate owns the `check`/`in`/`out` request/response contract, version
//! selection and code archive packing. It intentionally excludes the AWS SDK;
//! the function-management API is reached through adapters in `lambda_resource`.

pub mod archive;
pub mod context;
pub mod contract;
pub mod error;
pub mod protocol;
pub mod versions;
