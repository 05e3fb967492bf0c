pub mod auth;
pub mod cleanup;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod merchant;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reaper;
pub mod routes;
pub mod state;
