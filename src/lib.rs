pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod presenter;
pub mod session;
pub mod store;
pub mod stream;
pub mod view;
