pub mod config_file;
pub mod debug_log;
pub mod uploads;
