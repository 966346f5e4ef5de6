// Library exports for Amoret
// This allows integration tests and external code to use Amoret modules

pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod pagination;
pub mod repo;
pub mod routes;
pub mod state;
pub mod storage;
