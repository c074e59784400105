mod manager;
mod websocket;

pub use manager::*;
pub use websocket::*;
