pub mod config;
pub mod duplicate;
pub mod features;
pub mod image;
pub mod key;
pub mod library;
pub mod planner;
pub mod scanner;
pub mod similarity;
pub mod state;
pub mod thumbnail;
