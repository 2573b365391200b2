mod chunked;
mod client;
mod request;
mod response;

pub use client::AsyncHttpsClient;
pub use response::{HttpError, Response, ResponseFuture};
