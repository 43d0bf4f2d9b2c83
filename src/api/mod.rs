pub mod credentials;
pub mod handlers;
pub mod routes;
pub mod state;

pub use credentials::Credentials;
pub use routes::create_router;
pub use state::AppState;
