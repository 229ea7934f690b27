pub mod cli;
pub mod controller;
pub mod listener;
pub mod pid_file;
pub mod settings;

pub use self::{controller::MilterAlias, settings::Settings};
