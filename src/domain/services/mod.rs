mod chat;
pub mod export;
pub mod ids;
mod reconciler;
mod store;

pub use chat::*;
pub use reconciler::*;
pub use store::*;
