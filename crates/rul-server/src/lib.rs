//! HTTP transport and configuration for the RUL prediction service

pub mod api;
pub mod config;
