//! HTTP transport: axum routes over `LotService`.

mod routes;
mod server;

pub use routes::routes;
pub use server::{ServerConfig, serve};
