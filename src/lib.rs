//! postguard - a role-based access controlled posting API
//!
//! The server side lives in [`api`], [`services`] and [`db`]; [`client`] is a
//! reqwest-based library for talking to a running server.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
