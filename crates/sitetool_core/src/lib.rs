pub mod archive;
pub mod config;
pub mod filesystem;
pub mod markers;
pub mod runtime;
pub mod sidebar;
