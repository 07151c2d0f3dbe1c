//! Incremental newline-delimited decoding
//!
//! Splits a stream of byte chunks into lines without caring where the chunk
//! boundaries fall. Invariant: the internal buffer holds only bytes received
//! since the last line delimiter.

/// Streaming line splitter over arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and collect the lines it completes.
    ///
    /// Returned lines do not include the delimiter. Bytes after the last
    /// delimiter stay buffered until a later chunk (or [`Self::finish`])
    /// completes them.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                lines.push(std::mem::take(&mut self.pending));
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Bytes received since the last delimiter.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Consume the decoder, yielding the trailing line if the stream did not
    /// end with a delimiter.
    #[must_use]
    pub fn finish(self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"hello\n");
        assert_eq!(lines, vec![b"hello".to_vec()]);
        assert!(decoder.pending().is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_line_split_across_two_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.feed(b"hel").is_empty());
        assert_eq!(decoder.pending(), b"hel");
        let lines = decoder.feed(b"lo\n");
        assert_eq!(lines, vec![b"hello".to_vec()]);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"a\nb\nc\n");
        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_delimiter_alone_yields_empty_line() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"\n");
        assert_eq!(lines, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_trailing_line_without_delimiter() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"first\nlast");
        assert_eq!(lines, vec![b"first".to_vec()]);
        assert_eq!(decoder.pending(), b"last");
        assert_eq!(decoder.finish(), Some(b"last".to_vec()));
    }

    #[test]
    fn test_empty_chunk_is_a_no_op() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"par");
        assert!(decoder.feed(b"").is_empty());
        assert_eq!(decoder.pending(), b"par");
    }

    #[test]
    fn test_buffer_holds_only_bytes_since_last_delimiter() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"one\ntwo\nthr");
        assert_eq!(decoder.pending(), b"thr");
        decoder.feed(b"ee\nfo");
        assert_eq!(decoder.pending(), b"fo");
    }

    #[test]
    fn test_byte_at_a_time_chunking() {
        let input = b"{\"k\":1}\n{\"k\":2}\n";
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        for &byte in input.iter() {
            lines.extend(decoder.feed(&[byte]));
        }
        assert_eq!(lines, vec![b"{\"k\":1}".to_vec(), b"{\"k\":2}".to_vec()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_chunking_is_boundary_invariant() {
        let input: &[u8] = b"alpha\nbeta\ngamma\ndelta";
        let whole: Vec<Vec<u8>> = {
            let mut d = LineDecoder::new();
            let mut lines = d.feed(input);
            lines.extend(d.finish());
            lines
        };
        for split in 1..input.len() {
            let mut d = LineDecoder::new();
            let mut lines = d.feed(&input[..split]);
            lines.extend(d.feed(&input[split..]));
            lines.extend(d.finish());
            assert_eq!(lines, whole, "split at {split}");
        }
    }
}
