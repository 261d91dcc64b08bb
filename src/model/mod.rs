pub mod buffer;
pub mod config;
pub mod edit;
pub mod mode;
pub mod region;
