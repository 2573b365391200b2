// Stream-parses a unified diff into DiffChunks.
//
// State machine: OUTSIDE -> IN_FILE_HEADER -> IN_HUNK (spec §4.1). Lines
// inside a file header that aren't `new file mode` / `deleted file mode`
// (index, similarity, mode changes, ...) are ignored by design.

use crate::diff::model::{DiffChunk, DiffLine, LineMode};
use crate::errors::DiffmuxError;

#[derive(Debug, PartialEq, Eq)]
enum State {
    Outside,
    InFileHeader,
    InHunk,
}

pub struct DiffReader {
    state: State,
    old_filepath: String,
    new_filepath: String,
    is_new: bool,
    is_deleted: bool,
    /// Whether any `@@` hunk has been opened for the file header currently
    /// in progress; used to detect a pure rename (no content change).
    hunk_opened_for_file: bool,
    chunks: Vec<DiffChunk>,
    line_no: usize,
}

impl DiffReader {
    pub fn new() -> Self {
        Self {
            state: State::Outside,
            old_filepath: String::new(),
            new_filepath: String::new(),
            is_new: false,
            is_deleted: false,
            hunk_opened_for_file: false,
            chunks: Vec::new(),
            line_no: 0,
        }
    }

    /// Parse every line of `lines` and return the ordered list of DiffChunks.
    pub fn read_all<I, S>(mut self, lines: I) -> Result<Vec<DiffChunk>, DiffmuxError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in lines {
            self.ingest_line(raw.as_ref())?;
        }
        self.finish_current_file();
        Ok(self.chunks)
    }

    /// If the file header just finished was a pure rename (old != new path,
    /// not a create/delete) and no hunk was ever opened for it, emit an
    /// empty DiffChunk so PatchAssembler can still produce a rename header
    /// with an empty body (spec §8 boundary case).
    fn finish_current_file(&mut self) {
        if self.state == State::Outside {
            return;
        }
        let is_rename = self.old_filepath != self.new_filepath && !self.is_new && !self.is_deleted;
        if is_rename && !self.hunk_opened_for_file {
            self.chunks.push(DiffChunk {
                old_filepath: self.old_filepath.clone(),
                new_filepath: self.new_filepath.clone(),
                start: 1,
                is_new: false,
                is_deleted: false,
                lines: Vec::new(),
            });
        }
    }

    fn ingest_line(&mut self, line: &str) -> Result<(), DiffmuxError> {
        self.line_no += 1;

        if let Some(rest) = line.strip_prefix("diff --git a/") {
            if let Some((old, new)) = split_diff_header(rest) {
                self.finish_current_file();
                self.old_filepath = old;
                self.new_filepath = new;
                self.is_new = false;
                self.is_deleted = false;
                self.hunk_opened_for_file = false;
                self.state = State::InFileHeader;
            }
            return Ok(());
        }

        match self.state {
            State::Outside => Ok(()),
            State::InFileHeader => self.ingest_file_header_line(line),
            State::InHunk => self.ingest_hunk_line(line),
        }
    }

    fn ingest_file_header_line(&mut self, line: &str) -> Result<(), DiffmuxError> {
        if line.starts_with("new file mode") {
            self.is_new = true;
            return Ok(());
        }
        if line.starts_with("deleted file mode") {
            self.is_deleted = true;
            return Ok(());
        }
        if line.starts_with("@@") {
            return self.open_hunk(line);
        }
        // index, similarity, rename from/to, mode changes, --- / +++ lines: ignored
        Ok(())
    }

    fn ingest_hunk_line(&mut self, line: &str) -> Result<(), DiffmuxError> {
        if line.starts_with("@@") {
            return self.open_hunk(line);
        }

        let mut bytes = line.chars();
        let mode = match bytes.next() {
            Some(' ') => LineMode::Eq,
            Some('+') => LineMode::Insertion,
            Some('-') => LineMode::Deletion,
            Some('\\') => LineMode::NoNewline,
            _ => {
                // Anything else ends the hunk; fall back to file-header scanning
                // so trailing file-header-ish lines (next `diff --git`, EOF) are
                // tolerated rather than treated as malformed.
                self.state = State::InFileHeader;
                return Ok(());
            }
        };

        let content = if mode == LineMode::NoNewline {
            line.to_string()
        } else {
            bytes.as_str().to_string()
        };

        self.chunks
            .last_mut()
            .expect("ingest_hunk_line only runs with an open hunk")
            .lines
            .push(DiffLine { mode, content });
        Ok(())
    }

    fn open_hunk(&mut self, line: &str) -> Result<(), DiffmuxError> {
        let start = parse_hunk_start(line).ok_or_else(|| DiffmuxError::DiffFormat {
            line_no: self.line_no,
            detail: format!("malformed hunk header: {line}"),
        })?;

        self.chunks.push(DiffChunk {
            old_filepath: self.old_filepath.clone(),
            new_filepath: self.new_filepath.clone(),
            start,
            is_new: self.is_new,
            is_deleted: self.is_deleted,
            lines: Vec::new(),
        });
        self.hunk_opened_for_file = true;
        self.state = State::InHunk;
        Ok(())
    }
}

impl Default for DiffReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `<old> b/<new>` (the remainder of `diff --git a/`) into the two paths.
/// Paths cannot themselves contain the literal " b/" separator in a way that
/// is ambiguous for the diffs this parser is built to accept (git never quotes
/// paths here unless they contain unusual characters, which is out of scope).
fn split_diff_header(rest: &str) -> Option<(String, String)> {
    let idx = rest.find(" b/")?;
    let old = rest[..idx].to_string();
    let new = rest[idx + 3..].to_string();
    Some((old, new))
}

/// Parse `@@ -<s>,?<c>? +<s2>,?<c2>? @@` and return `<s>`.
/// `@@ -a +c @@` is equivalent to `@@ -a,1 +c,1 @@` (spec §6).
fn parse_hunk_start(header: &str) -> Option<usize> {
    let inner = header.strip_prefix("@@")?;
    let inner = inner.trim_start();
    let minus = inner.strip_prefix('-')?;
    let (num_part, _rest) = minus.split_once(|c: char| c == ',' || c == ' ')?;
    // A new-file hunk's minus-side start is `0` (`@@ -0,0 +1,N @@`); the
    // spec §3 "start >= 1" invariant describes ordinary hunks, not this case.
    num_part.parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::model::LineMode;

    fn lines(s: &str) -> Vec<&str> {
        s.lines().collect()
    }

    #[test]
    fn single_insertion_round_trips() {
        let diff = "diff --git a/f.py b/f.py\n\
             index 1111111..2222222 100644\n\
             --- a/f.py\n\
             +++ b/f.py\n\
             @@ -1,3 +1,4 @@\n\
              a\n\
             +b\n\
              c\n\
              d";
        let chunks = DiffReader::new().read_all(lines(diff)).unwrap();
        assert_eq!(chunks.len(), 1);
        let c = &chunks[0];
        assert_eq!(c.start, 1);
        assert_eq!(c.old_count(), 3);
        assert_eq!(c.new_count(), 4);
        assert_eq!(c.pre_image(), "a\nc\nd");
        assert_eq!(c.post_image(), "a\nb\nc\nd");
    }

    #[test]
    fn new_file_hunk() {
        let diff = "diff --git a/new.py b/new.py\n\
             new file mode 100644\n\
             index 0000000..1111111\n\
             --- /dev/null\n\
             +++ b/new.py\n\
             @@ -0,0 +1,2 @@\n\
             +foo\n\
             +bar";
        let chunks = DiffReader::new().read_all(lines(diff)).unwrap();
        assert_eq!(chunks.len(), 1);
        let c = &chunks[0];
        assert!(c.is_new);
        assert_eq!(c.old_count(), 0);
        assert_eq!(c.new_count(), 2);
    }

    #[test]
    fn deleted_file_hunk() {
        let diff = "diff --git a/old.py b/old.py\n\
             deleted file mode 100644\n\
             index 1111111..0000000\n\
             --- a/old.py\n\
             +++ /dev/null\n\
             @@ -1,2 +0,0 @@\n\
             -foo\n\
             -bar";
        let chunks = DiffReader::new().read_all(lines(diff)).unwrap();
        let c = &chunks[0];
        assert!(c.is_deleted);
        assert_eq!(c.new_count(), 0);
        assert_eq!(c.old_count(), 2);
    }

    #[test]
    fn no_newline_marker_contributes_to_neither_count() {
        let diff = "diff --git a/f.txt b/f.txt\n\
             --- a/f.txt\n\
             +++ b/f.txt\n\
             @@ -1,1 +1,1 @@\n\
             -old\n\
             \\ No newline at end of file\n\
             +new\n\
             \\ No newline at end of file";
        let chunks = DiffReader::new().read_all(lines(diff)).unwrap();
        let c = &chunks[0];
        assert_eq!(c.lines.iter().filter(|l| l.mode == LineMode::NoNewline).count(), 2);
        assert_eq!(c.old_count(), 1);
        assert_eq!(c.new_count(), 1);
    }

    #[test]
    fn rename_with_no_content_change() {
        let diff = "diff --git a/a.py b/b.py\n\
             similarity index 100%\n\
             rename from a.py\n\
             rename to b.py";
        let chunks = DiffReader::new().read_all(lines(diff)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_rename());
        assert!(chunks[0].lines.is_empty());
    }

    #[test]
    fn malformed_hunk_header_is_fatal() {
        let diff = "diff --git a/f.py b/f.py\n@@ garbage @@\n+x";
        let err = DiffReader::new().read_all(lines(diff)).unwrap_err();
        assert!(matches!(err, DiffmuxError::DiffFormat { .. }));
    }

    #[test]
    fn empty_diff_yields_no_chunks() {
        let chunks = DiffReader::new().read_all(Vec::<&str>::new()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn equivalent_short_hunk_header() {
        let diff = "diff --git a/f.py b/f.py\n@@ -5 +5 @@\n x";
        let chunks = DiffReader::new().read_all(lines(diff)).unwrap();
        assert_eq!(chunks[0].start, 5);
    }
}
