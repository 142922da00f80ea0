pub mod config;
pub mod handlers;
pub mod models;
pub mod moderation;
pub mod notify;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
