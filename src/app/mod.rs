// Application layer - Session and service wiring

pub mod container;
pub mod session;

pub use container::{AppContainer, DefaultAppContainer};
pub use session::CutSession;
