// Orchestrates C1 -> C4 -> C6 -> C7 -> C8 and binds groups to generated
// commit messages (spec §4.8).

mod manifest;

pub use manifest::CommitGroup;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::chunk;
use crate::cluster;
use crate::config::Config;
use crate::diff::{DiffChunk, DiffReader, LineMode};
use crate::errors::DiffmuxError;
use crate::http::AsyncHttpsClient;
use crate::lang;
use crate::model::ModelClient;
use crate::patch::PatchAssembler;

const EMBEDDING_MODEL: &str = "text-embedding-3-small";
const CHAT_MODEL: &str = "gpt-4o-mini";
const MODEL_API_HOST: &str = "api.openai.com";
const COMMIT_MESSAGE_MAX_TOKENS: u32 = 200;
const COMMIT_MESSAGE_TEMPERATURE: f32 = 0.3;

pub struct PipelineOptions {
    pub out_dir: PathBuf,
    pub max_chars: usize,
    pub threshold: f32,
    pub interactive: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            out_dir: std::env::temp_dir().join(format!("diffmux-{}", std::process::id())),
            max_chars: chunk::DEFAULT_MAX_CHARS,
            threshold: 0.5,
            interactive: false,
        }
    }
}

pub struct Pipeline {
    model: ModelClient,
    http: AsyncHttpsClient,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self, DiffmuxError> {
        let http = AsyncHttpsClient::new().map_err(|e| DiffmuxError::Network {
            host: MODEL_API_HOST.to_string(),
            detail: e.to_string(),
        })?;
        let model = ModelClient::new(MODEL_API_HOST, config.api_key.clone(), EMBEDDING_MODEL, CHAT_MODEL);
        Ok(Self { model, http })
    }

    /// Run the full pipeline over a unified-diff stream and write patch
    /// files + manifest under `opts.out_dir` (spec §4.8).
    pub fn run<I, S>(&mut self, lines: I, opts: &PipelineOptions) -> Result<Vec<CommitGroup>, DiffmuxError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        std::fs::create_dir_all(&opts.out_dir).map_err(|source| DiffmuxError::Filesystem {
            path: opts.out_dir.display().to_string(),
            source,
        })?;
        let out_dir = std::fs::canonicalize(&opts.out_dir).map_err(|source| DiffmuxError::Filesystem {
            path: opts.out_dir.display().to_string(),
            source,
        })?;

        let hunks = DiffReader::new().read_all(lines)?;
        info!(hunks = hunks.len(), "parsed diff");

        let mut sub_hunks: Vec<DiffChunk> = Vec::new();
        for hunk in &hunks {
            let tag = lang::detect(&hunk.new_filepath);
            sub_hunks.extend(chunk::chunk(hunk, tag, opts.max_chars));
        }
        info!(sub_hunks = sub_hunks.len(), "chunked hunks");

        if sub_hunks.is_empty() {
            let path = manifest::write_manifest(&out_dir, &[])?;
            info!(manifest = %path.display(), "wrote empty manifest");
            return Ok(Vec::new());
        }

        let embeddings = self.embed_all(&sub_hunks);

        let partition = cluster::cluster(&embeddings, opts.threshold);
        info!(clusters = partition.len(), "clustered sub-hunks");

        let mut assembler = PatchAssembler::new();
        let mut groups = Vec::new();
        // Clusters that actually produced a patch file, keyed by their
        // original partition index so visualization point/cluster ids stay
        // consistent with one another (a cluster whose every sub-hunk was
        // an empty rename-only patch never appears here).
        let mut surviving: Vec<(usize, Vec<usize>, String)> = Vec::new();

        for (k, idxs) in partition.iter().enumerate() {
            let mut cluster_chunks: Vec<DiffChunk> = idxs.iter().map(|&i| sub_hunks[i].clone()).collect();
            let paths = assembler.write_cluster(&out_dir, k, &mut cluster_chunks)?;
            if paths.is_empty() {
                continue;
            }
            let commit_message = self.generate_commit_message(&cluster_chunks);
            surviving.push((k, idxs.clone(), commit_message.clone()));
            groups.push(CommitGroup { patch_paths: paths, commit_message });
        }

        let manifest_path = manifest::write_manifest(&out_dir, &groups)?;
        info!(manifest = %manifest_path.display(), groups = groups.len(), "wrote manifest");

        if opts.interactive {
            self.write_visualization(&out_dir, &surviving, &sub_hunks)?;
        }

        Ok(groups)
    }

    /// Submit one embedding request per sub-hunk, drive the event loop
    /// once, and collect the results in the order the futures were
    /// created (spec §5 "Downstream stages see embeddings in the order in
    /// which embedding futures were created").
    fn embed_all(&mut self, sub_hunks: &[DiffChunk]) -> Vec<Vec<f32>> {
        let futures: Vec<_> = sub_hunks
            .iter()
            .map(|sh| self.model.embed(&mut self.http, &diff_text(std::slice::from_ref(sh))))
            .collect();

        if let Err(e) = self.http.run_loop() {
            warn!(error = %e, "event loop terminated with an I/O error; remaining requests treated as failed");
        }

        futures.into_iter().map(|f| ModelClient::extract_embedding(f.take())).collect()
    }

    fn generate_commit_message(&mut self, cluster_chunks: &[DiffChunk]) -> String {
        let prompt = commit_prompt(cluster_chunks);
        let messages = ModelClient::commit_message_prompt(&prompt);
        let future = self.model.chat(&mut self.http, &messages, COMMIT_MESSAGE_MAX_TOKENS, COMMIT_MESSAGE_TEMPERATURE);
        if let Err(e) = self.http.run_loop() {
            warn!(error = %e, "event loop terminated with an I/O error while requesting a commit message");
        }
        ModelClient::extract_chat_message(future.take())
    }

    fn write_visualization(
        &self,
        out_dir: &Path,
        surviving: &[(usize, Vec<usize>, String)],
        sub_hunks: &[DiffChunk],
    ) -> Result<(), DiffmuxError> {
        let filepaths: Vec<String> = sub_hunks.iter().map(|c| c.new_filepath.clone()).collect();
        let previews: Vec<String> = sub_hunks.iter().map(preview_of).collect();
        manifest::write_visualization(out_dir, surviving, &filepaths, &previews)?;
        Ok(())
    }
}

/// Render a slice of chunks the way spec §4.8 step 6 describes: each line
/// prefixed with `Insertion:` / `Deletion:` / nothing. Used both as the
/// text submitted for embedding (one sub-hunk) and as the body of the
/// commit-message prompt (a whole cluster).
fn diff_text(chunks: &[DiffChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        for line in &chunk.lines {
            match line.mode {
                LineMode::Insertion => out.push_str("Insertion: "),
                LineMode::Deletion => out.push_str("Deletion: "),
                LineMode::Eq | LineMode::NoNewline => {}
            }
            out.push_str(&line.content);
            out.push('\n');
        }
    }
    out
}

/// The commit-message prompt body: a "Files changed" header ahead of the
/// `Insertion:`/`Deletion:`-prefixed diff text (SPEC_FULL "File-context-
/// aware commit prompt", traced to the original's `aicommit` prompt).
fn commit_prompt(cluster_chunks: &[DiffChunk]) -> String {
    let mut files: Vec<&str> = cluster_chunks.iter().map(|c| c.new_filepath.as_str()).collect();
    files.sort_unstable();
    files.dedup();
    format!("Files changed: {}\n{}", files.join(", "), diff_text(cluster_chunks))
}

fn preview_of(chunk: &DiffChunk) -> String {
    let first = chunk
        .lines
        .iter()
        .find(|l| matches!(l.mode, LineMode::Insertion | LineMode::Eq))
        .map(|l| l.content.as_str())
        .unwrap_or("");
    first.chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffLine;

    fn sample_chunk() -> DiffChunk {
        DiffChunk {
            old_filepath: "f.py".into(),
            new_filepath: "f.py".into(),
            start: 1,
            is_new: false,
            is_deleted: false,
            lines: vec![
                DiffLine { mode: LineMode::Eq, content: "a".into() },
                DiffLine { mode: LineMode::Insertion, content: "b".into() },
                DiffLine { mode: LineMode::Deletion, content: "c".into() },
            ],
        }
    }

    #[test]
    fn diff_text_prefixes_insertions_and_deletions_only() {
        let text = diff_text(&[sample_chunk()]);
        assert!(text.contains("Insertion: b"));
        assert!(text.contains("Deletion: c"));
        assert!(text.contains("a\n"));
        assert!(!text.contains("Insertion: a"));
    }

    #[test]
    fn commit_prompt_lists_unique_sorted_files() {
        let mut b = sample_chunk();
        b.old_filepath = "z.py".into();
        b.new_filepath = "z.py".into();
        let prompt = commit_prompt(&[sample_chunk(), b]);
        assert!(prompt.starts_with("Files changed: f.py, z.py"));
    }

    #[test]
    fn preview_prefers_insertion_over_deletion() {
        assert_eq!(preview_of(&sample_chunk()), "a");
    }
}
