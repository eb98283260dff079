pub mod audience;
pub mod broadcast;
pub mod connections;
pub mod handler;
pub mod messages;

pub use handler::handle_websocket_event;
