//! Push-token registry and notification dispatch for the finance tracker

pub mod cleanup;
pub mod config;
pub mod device;
pub mod error;
pub mod facade;
pub mod gateway;
pub mod identity;
pub mod kv;
pub mod listeners;
pub mod manager;
pub mod models;
pub mod preferences;
pub mod repositories;
pub mod routes;
pub mod state;

#[cfg(test)]
mod testing;
