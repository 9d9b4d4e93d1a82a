pub mod permission;
pub mod principal;
pub mod role;
pub mod role_permission;
pub mod tenant;
