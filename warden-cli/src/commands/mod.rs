pub mod backup;
mod context;
pub mod lifecycle;
pub mod logs;
pub mod server;
pub mod status;
