pub mod auth;
pub mod call_state;
pub mod config;
pub mod db;
pub mod dial_plan;
pub mod error;
pub mod fallback;
pub mod models;
pub mod presence;
pub mod reconcile;
pub mod routes;
pub mod schema;
pub mod signature;
pub mod state;
pub mod store;
pub mod twiml;
