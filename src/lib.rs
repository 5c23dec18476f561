pub mod app;
pub mod assets;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod state;
pub mod storage;
