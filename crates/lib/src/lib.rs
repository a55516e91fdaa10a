//! Yuanzhang core library: LINE webhook gateway, reply router, and the photo, generative-text,
//! and messaging clients it drives. Used by the `yuanzhang` CLI.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod persona;
pub mod photos;
pub mod quotes;
pub mod reply;
pub mod router;
