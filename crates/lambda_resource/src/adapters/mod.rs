pub mod aws;
pub mod lambda_api;
