pub mod attempt;
pub mod capability;
pub mod config;
pub mod device;
pub mod error;
pub mod levels;
pub mod payload;
pub mod state;
