pub mod assignment;
pub mod error;
pub mod permission;
pub mod service;
