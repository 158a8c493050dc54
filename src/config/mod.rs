/// Store handle, connection management and table creation
pub mod database;

/// Settings loading from config.toml and the environment
pub mod settings;
