pub mod app;
pub mod clock;
pub mod config;
pub mod meals;
pub mod state;
