//! Proxy server implementation

mod handler;
mod router;
mod server;

pub use handler::{RequestHandler, SessionState};
pub use router::{AppState, CALLBACK_SUCCESS_MESSAGE, create_router};
pub use server::Gateway;
