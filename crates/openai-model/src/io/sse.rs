use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// Reads the `data` payloads of server-sent events from a chunk stream.
///
/// Comment lines (OpenRouter sends `: OPENROUTER PROCESSING` while the
/// upstream model is queued) and fields other than `data` are skipped.
/// Multiple `data` lines in one event are joined with `\n`. An incomplete
/// event at the end of the stream is dropped.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(data) = self.try_parse_event()? {
                return Ok(Some(data));
            }
            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            // Only `\n` is treated as a line ending below.
            self.buf.extend(bytes.iter().filter(|b| **b != b'\r'));
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            // Decoding per event keeps multi-byte characters that straddle
            // chunk boundaries intact.
            let Ok(block) = str::from_utf8(&block[..end]) else {
                return Err(Error::InvalidPayload);
            };

            let mut data: Option<String> = None;
            for line in block.split('\n') {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => {
                        (field, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                if field != "data" {
                    continue;
                }
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            }
            if data.is_some() {
                return Ok(data);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static [u8]]) -> Sse {
        Sse::new(Chunks::from_vec_deque(
            chunks.iter().map(|c| Bytes::from_static(*c)).collect(),
        ))
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse =
            sse_from(&[&b"data: hello\n\n"[..], &b"data: bye\n\n"[..]]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_across_chunks() {
        let mut sse = sse_from(&[
            &b"data:"[..],
            &b" hel"[..],
            &b"lo\r\n"[..],
            &b"\r\n"[..],
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);

        // "é" is two bytes, split over two chunks.
        let mut sse = sse_from(&[&b"data: caf\xc3"[..], &b"\xa9\n\n"[..]]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "café");
    }

    #[tokio::test]
    async fn test_comments_and_other_fields() {
        let mut sse = sse_from(&[
            &b": OPENROUTER PROCESSING\n\n"[..],
            &b"event: message\nid: 7\ndata: {\"a\":1}\n\n"[..],
            &b"xxxxxx\n\n"[..],
            &b"data: first\ndata: second\n\n"[..],
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "first\nsecond");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_or_incomplete() {
        let mut sse = sse_from(&[&b"data: \xff\xfe\n\n"[..]]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        let mut sse = sse_from(&[&b"data: hello\n"[..], &b"data: bye\n"[..]]);
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
