pub mod data;
pub mod error;
pub mod models;
pub mod modules;
