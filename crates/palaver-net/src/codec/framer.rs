use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::NetError;

/// Longest command line accepted before the framer aborts the session.
pub const MAX_LINE_LEN: usize = 4096;

/// One framed unit off the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete text line, LF (and a trailing CR) stripped.
    Line(Bytes),
    /// A slice of an in-flight binary payload.
    Binary(Bytes),
}

/// Incremental framer for one connection.
///
/// In text mode it assembles LF-terminated lines. While `binary_residual`
/// is non-zero the next that-many bytes are handed through untouched, then
/// the framer drops back to text mode; bytes past the payload stay
/// buffered as text input for the next command.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    binary_residual: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes still owed to the current binary payload.
    pub fn binary_residual(&self) -> u64 {
        self.binary_residual
    }

    /// Switches the framer into binary mode for the next `n` bytes.
    /// Only valid between frames.
    pub fn enter_binary_mode(&mut self, n: u64) {
        self.binary_residual = n;
    }
}

impl Decoder for FrameDecoder {
    type Item = Frame;
    type Error = NetError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, NetError> {
        if self.binary_residual > 0 {
            if src.is_empty() {
                return Ok(None);
            }
            let take = src.len().min(self.binary_residual as usize);
            self.binary_residual -= take as u64;
            return Ok(Some(Frame::Binary(src.split_to(take).freeze())));
        }

        if let Some(pos) = src.iter().position(|&b| b == b'\n') {
            // The bound holds for any segmentation of the stream, so a
            // line is oversized even when it arrives whole.
            if pos > MAX_LINE_LEN {
                return Err(NetError::LineSize(pos));
            }
            let mut line = src.split_to(pos);
            src.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            return Ok(Some(Frame::Line(line.freeze())));
        }

        if src.len() > MAX_LINE_LEN {
            return Err(NetError::LineSize(src.len()));
        }
        Ok(None)
    }
}

/// Pass-through encoder; replies and relayed payloads are already
/// wire-formatted when they reach the write half.
#[derive(Debug, Default)]
pub struct RawEncoder;

impl<'a> Encoder<&'a [u8]> for RawEncoder {
    type Error = NetError;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), NetError> {
        dst.reserve(item.len());
        dst.put_slice(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;

    /// Feeds `chunks` through one decoder, collecting frames until the
    /// input is exhausted or the framer aborts.
    fn run(chunks: &[&[u8]]) -> (Vec<Frame>, bool) {
        let mut dec = FrameDecoder::new();
        let mut buf = BytesMut::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            buf.extend_from_slice(chunk);
            loop {
                match dec.decode(&mut buf) {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => break,
                    Err(_) => return (frames, true),
                }
            }
        }
        (frames, false)
    }

    fn line(s: &[u8]) -> Frame {
        Frame::Line(Bytes::copy_from_slice(s))
    }

    #[test]
    fn splits_lines() {
        let (frames, err) = run(&[b"hello\nworld\n"]);
        assert!(!err);
        assert_eq!(frames, vec![line(b"hello"), line(b"world")]);
    }

    #[test]
    fn strips_trailing_cr() {
        let (frames, _) = run(&[b"hello\r\n"]);
        assert_eq!(frames, vec![line(b"hello")]);
        // Only the final CR is stripped
        let (frames, _) = run(&[b"he\rllo\r\r\n"]);
        assert_eq!(frames, vec![line(b"he\rllo\r")]);
    }

    #[test]
    fn emits_empty_lines() {
        let (frames, _) = run(&[b"\n\r\nx\n"]);
        assert_eq!(frames, vec![line(b""), line(b""), line(b"x")]);
    }

    #[test]
    fn keeps_partial_line_buffered() {
        let (frames, err) = run(&[b"/msg hel", b"lo\n"]);
        assert!(!err);
        assert_eq!(frames, vec![line(b"/msg hello")]);
    }

    #[test]
    fn oversized_line_aborts() {
        let big = vec![b'a'; MAX_LINE_LEN + 1];
        let (frames, err) = run(&[&big]);
        assert!(err);
        assert!(frames.is_empty());

        // The same line delivered in one chunk with its LF still aborts
        let mut with_lf = big;
        with_lf.push(b'\n');
        let (_, err) = run(&[&with_lf]);
        assert!(err);
    }

    #[test]
    fn line_at_the_bound_is_accepted() {
        let mut exact = vec![b'a'; MAX_LINE_LEN];
        exact.push(b'\n');
        let (frames, err) = run(&[&exact]);
        assert!(!err);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn binary_mode_hands_bytes_through() {
        let mut dec = FrameDecoder::new();
        let mut buf = BytesMut::from(&b"\x01\x02\x03"[..]);
        dec.enter_binary_mode(5);

        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::Binary(Bytes::from_static(b"\x01\x02\x03")));
        assert_eq!(dec.binary_residual(), 2);

        buf.extend_from_slice(b"\x04\x05");
        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::Binary(Bytes::from_static(b"\x04\x05")));
        assert_eq!(dec.binary_residual(), 0);
    }

    #[test]
    fn binary_tail_returns_to_text_mode() {
        let mut dec = FrameDecoder::new();
        let mut buf = BytesMut::from(&b"\x01\x02\x03\x04\x05/msg next\n"[..]);
        dec.enter_binary_mode(5);

        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Binary(Bytes::from_static(b"\x01\x02\x03\x04\x05"))
        );
        // The tail past the payload is the next command line
        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, line(b"/msg next"));
    }

    quickcheck! {
        /// Any segmentation of the same byte stream yields the same frames.
        fn chunking_is_equivalent(data: Vec<u8>, cuts: Vec<usize>) -> bool {
            let whole = run(&[&data]);

            let mut cuts: Vec<usize> = if data.is_empty() {
                Vec::new()
            } else {
                cuts.iter().map(|c| c % data.len()).collect()
            };
            cuts.sort_unstable();
            cuts.dedup();

            let mut chunks = Vec::new();
            let mut start = 0;
            for cut in cuts {
                chunks.push(&data[start..cut]);
                start = cut;
            }
            chunks.push(&data[start..]);

            run(&chunks) == whole
        }
    }
}
