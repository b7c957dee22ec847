pub mod auth;
pub mod db_loader;
pub mod file_processor;
pub mod profiler;
