pub mod config;
pub mod constants;
pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use controllers::{ChatController, SendOutcome};
