pub mod billing;
pub mod catalog;
pub mod handlers;
pub mod models;
