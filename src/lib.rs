pub mod api;
pub mod app;
pub mod session;
pub mod utils;

pub use app::{SessionContext, Settings};
pub use session::{ActiveChat, MessagesSession, SessionError, SessionSnapshot};
