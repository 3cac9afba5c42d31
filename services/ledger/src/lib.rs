//! Transactions and savings goals for the finance tracker

pub mod config;
pub mod error;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
