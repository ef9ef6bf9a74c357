pub mod handlers;
pub mod server;
pub mod state;

pub use server::{bind_listener, build_router, run_server, serve};
pub use state::AppState;
