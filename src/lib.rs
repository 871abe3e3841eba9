//! Krishi Mitra Backend Library
//!
//! Farmer-to-buyer marketplace, order workflow, crop disease diagnosis and dashboards.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod diagnosis;
pub mod error;
pub mod handlers;
pub mod market;
pub mod middleware;
pub mod models;
pub mod orders;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
