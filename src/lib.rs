pub mod config;
pub mod database;
pub mod error;
pub mod geo;
pub mod models;
pub mod services;
pub mod web;
