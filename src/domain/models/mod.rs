mod action;
mod event;
mod message;
mod provider;
mod role;
mod session;
mod slash_commands;
mod storage;

pub use action::*;
pub use event::*;
pub use message::*;
pub use provider::*;
pub use role::*;
pub use session::*;
pub use slash_commands::*;
pub use storage::*;
