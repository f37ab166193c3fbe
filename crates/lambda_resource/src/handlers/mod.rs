pub mod check;
pub mod get;
pub mod put;
