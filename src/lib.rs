pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod media;
pub mod response;
pub mod routes;
pub mod search;
pub mod state;
