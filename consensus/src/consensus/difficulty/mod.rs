//! Difficulty adjustment over blue block windows

pub mod manager;
pub mod window;

pub use manager::DifficultyManager;
pub use window::blue_window;
