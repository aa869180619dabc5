pub mod capture;
pub mod config;
pub mod console;
pub mod speaker;
