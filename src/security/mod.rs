mod policy;
mod validator;

pub use policy::CommandPolicy;
pub use validator::{
    MAX_COMMAND_BYTES, MAX_COMMAND_TOKENS, MAX_HOST_NAME_LEN, ValidatedCommand, ValidatedPath,
    validate_command, validate_host_name, validate_path,
};
