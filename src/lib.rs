pub mod connection;
pub mod deconz;
pub mod directory;
pub mod event;
pub mod fill;
pub mod pipeline;
pub mod sink;
