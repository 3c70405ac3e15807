pub mod config_cmd;
pub mod replay;
pub mod status;
