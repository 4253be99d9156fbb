//! Relay core library — webhook gateway, identity lookup, content normalization,
//! QA bridge and reply dispatch, used by the CLI.

pub mod config;
pub mod content;
pub mod dispatch;
pub mod gateway;
pub mod http;
pub mod identity;
pub mod init;
pub mod policy;
pub mod qa;
pub mod relay;
