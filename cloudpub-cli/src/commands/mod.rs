//! CLI command implementations

pub mod init;
pub mod publish;
pub mod token;
