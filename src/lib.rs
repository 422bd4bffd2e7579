//! Library exports for the nested CRUD service
//!
//! The engines, storage and routing are usable on their own; the binary only
//! wires them to the bundled [`catalog`] domain.

pub mod catalog;
pub mod config;
pub mod database;
pub mod dto;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod identifier;
pub mod model;
pub mod pagination;
pub mod resolver;
pub mod route;
pub mod service;
