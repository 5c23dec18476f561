pub mod dto;
pub mod handlers;
pub mod mime;
pub mod services;
