use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// Reads the `data` payloads of server-sent events from a chunk stream.
///
/// Only what chat-completion streams use is supported: `data` fields,
/// comment lines (ignored), and LF or CRLF line endings. Multiple `data`
/// lines in one event are joined with a newline.
pub struct Sse {
    buf: String,
    chunks: Chunks,
    exhausted: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }
            if self.exhausted {
                return Ok(None);
            }

            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => {
                    let Ok(s) = str::from_utf8(&bytes) else {
                        return Err(Error::InvalidPayload);
                    };
                    self.buf.push_str(&s.replace("\r\n", "\n"));
                }
                None => self.exhausted = true,
            }
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            let Some(end) = self.buf.find("\n\n") else {
                return Ok(None);
            };
            let block: String = self.buf.drain(..end + 2).collect();

            let mut data: Option<String> = None;
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => {
                        (field, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match field {
                    "data" => {
                        let data = data.get_or_insert_default();
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    "event" | "id" | "retry" => {}
                    _ => return Err(Error::InvalidPayload),
                }
            }

            // Comment-only blocks (keep-alives) carry no data.
            if let Some(data) = data {
                return Ok(Some(data));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static [u8]]) -> Sse {
        Sse::new(Chunks::from_vec_deque(
            chunks.iter().copied().map(Bytes::from_static).collect(),
        ))
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse_from(&[b"data: hello\n\n", b"data: bye\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_across_chunks() {
        let mut sse = sse_from(&[b"data:", b" hello\n", b"\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_several_events_in_one_chunk() {
        let mut sse = sse_from(&[b"data: a\n\ndata: b\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "a");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "b");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_comments_and_crlf() {
        let mut sse =
            sse_from(&[b": keep-alive\r\n\r\n", b"event: x\r\ndata: hi\r\n\r\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hi");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = sse_from(&[b"xxxxxx\n\n"]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        // Incomplete events at the end of the stream are dropped.
        let mut sse = sse_from(&[b"data: hello\n", b"data: bye\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse_from(&[&[0xff, 0xfe]]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);
    }
}
