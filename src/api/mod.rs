//! This mod is meant to hold most of the code for the library's server-facing API.
mod chat_server;
mod options;
mod wiring;

pub use chat_server::ChatServer;
pub use chat_server::ChatServerError;
pub use options::ServerOptions;
pub use wiring::try_create_chat_server;
pub use wiring::ServerConfig;
pub use wiring::ServerCreationError;
