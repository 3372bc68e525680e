pub mod event;
pub mod types;
pub mod validator;

pub use event::Event;
pub use types::*;
