// src/health/checks/mod.rs
mod custom;
mod http;
mod tcp;

pub use custom::CustomCheck;
pub use http::HttpCheck;
pub use tcp::TcpCheck;
