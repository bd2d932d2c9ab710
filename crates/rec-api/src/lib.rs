//! HTTP front of the recommender service.

pub mod config;
pub mod server;
