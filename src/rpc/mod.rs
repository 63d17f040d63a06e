// src/rpc/mod.rs

//! The control-plane wire layer: outbound calls (`client`), inbound
//! routes (`server`), and the shared DTOs/constants (`wire`).

pub mod client;
pub mod server;
pub mod wire;

pub use client::RpcClient;
pub use wire::ActionMessage;
