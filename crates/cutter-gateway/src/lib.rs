//! HTTP surface of the shortener.
//!
//! [`App::router`] wires the handlers onto an [`AppState`] that holds a
//! type-erased [`Shortener`](cutter_shortener::Shortener) and the
//! [`DeletionQueue`](cutter_shortener::DeletionQueue).

pub mod app;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use error::AppError;
pub use state::AppState;
