mod chunker;
mod post_image;

pub use chunker::{chunk, DEFAULT_MAX_CHARS};
