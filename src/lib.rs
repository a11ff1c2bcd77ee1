// src/lib.rs
pub mod api;
pub mod banner;
pub mod config;
pub mod database;
pub mod errors;
pub mod generator;
pub mod host;
pub mod models;
pub mod providers;
pub mod sandbox;
pub mod worker;
