// Stateful chunked transfer-encoding decoder (spec §4.4 `READING_BODY`,
// chunked mode; spec §9 notes an earlier variant mishandled boundaries
// across socket reads — this one tolerates arbitrary chunking of the
// underlying byte stream by buffering across `feed` calls).

use crate::errors::DiffmuxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Size,
    Data(usize),
    DataCrlf,
    TrailerCrlf,
    Done,
}

pub struct ChunkedDecoder {
    buf: Vec<u8>,
    stage: Stage,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new(), stage: Stage::Size }
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Feed newly-read bytes and append any newly-decoded body bytes to
    /// `out`. Returns `Ok(true)` once the terminating zero-length chunk and
    /// its trailing CRLF have been consumed.
    pub fn feed(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<bool, DiffmuxError> {
        self.buf.extend_from_slice(data);

        loop {
            match self.stage {
                Stage::Done => return Ok(true),
                Stage::Size => {
                    let Some(pos) = find_crlf(&self.buf) else { return Ok(false) };
                    let line = &self.buf[..pos];
                    let line_str = std::str::from_utf8(line)
                        .map_err(|_| DiffmuxError::Protocol("chunk size line is not UTF-8".into()))?;
                    let size_str = line_str.split(';').next().unwrap_or("").trim();
                    let size = usize::from_str_radix(size_str, 16)
                        .map_err(|_| DiffmuxError::Protocol(format!("bad chunk size: {size_str:?}")))?;
                    self.buf.drain(..pos + 2);
                    self.stage = if size == 0 { Stage::TrailerCrlf } else { Stage::Data(size) };
                }
                Stage::Data(remaining) => {
                    if self.buf.is_empty() {
                        return Ok(false);
                    }
                    let take = remaining.min(self.buf.len());
                    out.extend_from_slice(&self.buf[..take]);
                    self.buf.drain(..take);
                    let left = remaining - take;
                    self.stage = if left == 0 { Stage::DataCrlf } else { Stage::Data(left) };
                    if left > 0 {
                        return Ok(false);
                    }
                }
                Stage::DataCrlf => {
                    if self.buf.len() < 2 {
                        return Ok(false);
                    }
                    if &self.buf[..2] != b"\r\n" {
                        return Err(DiffmuxError::Protocol("missing CRLF after chunk data".into()));
                    }
                    self.buf.drain(..2);
                    self.stage = Stage::Size;
                }
                Stage::TrailerCrlf => {
                    if self.buf.len() < 2 {
                        return Ok(false);
                    }
                    if &self.buf[..2] != b"\r\n" {
                        return Err(DiffmuxError::Protocol("missing final CRLF".into()));
                    }
                    self.buf.drain(..2);
                    self.stage = Stage::Done;
                }
            }
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_whole_stream_in_one_feed() {
        let mut d = ChunkedDecoder::new();
        let mut out = Vec::new();
        let done = d.feed(b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n", &mut out).unwrap();
        assert!(done);
        assert_eq!(out, b"hello, world");
    }

    #[test]
    fn decodes_regardless_of_byte_boundaries() {
        let stream = b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n";
        for split in 1..stream.len() {
            let mut d = ChunkedDecoder::new();
            let mut out = Vec::new();
            let (a, b) = stream.split_at(split);
            let done1 = d.feed(a, &mut out).unwrap();
            let done2 = if !done1 { d.feed(b, &mut out).unwrap() } else { true };
            assert!(done1 || done2, "split at {split} never finished");
            assert_eq!(out, b"hello, world", "split at {split} produced wrong body");
        }
    }

    #[test]
    fn rejects_non_hex_size() {
        let mut d = ChunkedDecoder::new();
        let mut out = Vec::new();
        let err = d.feed(b"zz\r\n", &mut out).unwrap_err();
        assert!(matches!(err, DiffmuxError::Protocol(_)));
    }
}
