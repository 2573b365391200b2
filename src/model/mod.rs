mod client;

pub use client::{ChatMessage, ModelClient};
