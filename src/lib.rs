//! Terminal dashboard and CLI for the SMS Gateway Pro backend

pub mod app;
pub mod cli;
pub mod core;
pub mod screens;
pub mod utils;
pub mod widgets;
