pub mod actions;
pub mod auth;
pub mod config;
pub mod context;
pub mod email;
pub mod error;
pub mod handlers;
pub mod jsonq;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod services;
pub mod storage;
pub mod tasks;
pub mod validate;
pub mod worker;

#[cfg(test)]
pub mod testing;
