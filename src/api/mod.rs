pub mod client;
pub mod error;
pub mod events;
pub mod models;

pub use client::{ApiClient, MessagingApi};
pub use error::ApiError;
