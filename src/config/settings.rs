// Configuration structs (spec SPEC_FULL "Configuration").

#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the ModelClient's embedding/chat endpoints.
    pub api_key: String,

    /// Clustering distance threshold (spec §4.6, §6 `-d`). Default 0.5.
    pub similarity_threshold: f32,
}

impl Config {
    pub fn new(api_key: String) -> Self {
        Self { api_key, similarity_threshold: 0.5 }
    }
}
