pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::{NOTIFY_PATH, create_router};
