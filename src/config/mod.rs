mod loader;
mod registry;
pub mod ssh_config;
mod types;

pub use loader::{
    ENV_BIND_ADDRESS, ENV_COMMAND_TIMEOUT, ENV_IDLE_TIMEOUT, ENV_MAX_FILE_SIZE, ENV_POOL_MAX_SIZE,
    ENV_PORT, apply_env_overrides, default_config_path, load_settings,
};
pub use registry::HostRegistry;
pub use types::*;
