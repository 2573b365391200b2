mod model;
mod reader;

pub use model::{DiffChunk, DiffLine, LineMode};
pub use reader::DiffReader;
