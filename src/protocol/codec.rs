use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::core::Error;
use super::message::LinkLine;

/// Longest text-link line accepted before it is discarded
pub const MAX_LINE_LENGTH: usize = 1024;

/// Newline-delimited codec for the relay's text link
#[derive(Clone, Debug, Default)]
pub struct LinkCodec {
    /// Set while skipping the rest of an over-long line
    discarding: bool,
}

impl LinkCodec {
    /// Creates a new link codec
    pub fn new() -> Self {
        LinkCodec::default()
    }
}

impl Decoder for LinkCodec {
    type Item = LinkLine;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(newline) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_LINE_LENGTH {
                    warn!(len = src.len(), "discarding over-long link line");
                    src.clear();
                    self.discarding = true;
                }
                // Need more data to complete the line
                return Ok(None);
            };

            let line = src.split_to(newline + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > MAX_LINE_LENGTH + 1 {
                warn!(len = line.len(), "discarding over-long link line");
                continue;
            }

            let text = String::from_utf8_lossy(&line[..newline]);
            if text.trim().is_empty() {
                continue;
            }
            return Ok(Some(LinkLine::parse(&text)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() || self.discarding {
            src.clear();
            return Ok(None);
        }
        let text = String::from_utf8_lossy(src.chunk()).into_owned();
        src.advance(src.len());
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(LinkLine::parse(&text)))
    }
}

impl Encoder<LinkLine> for LinkCodec {
    type Error = Error;

    fn encode(&mut self, item: LinkLine, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let text = item.to_string();
        dst.reserve(text.len() + 1);
        dst.put_slice(text.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::CgpArgs;

    #[test]
    fn test_codec_lines() {
        let mut codec = LinkCodec::new();
        let mut bytes = BytesMut::from("s: 0102\r\n\n  \ncgp: 1 2 3\npartial");

        assert_eq!(codec.decode(&mut bytes).unwrap(), Some(LinkLine::Send(vec![1, 2])));
        assert_eq!(
            codec.decode(&mut bytes).unwrap(),
            Some(LinkLine::Tune(CgpArgs { channel: Some(1), group: Some(2), power: Some(3) }))
        );
        assert_eq!(codec.decode(&mut bytes).unwrap(), None);
        assert_eq!(
            codec.decode_eof(&mut bytes).unwrap(),
            Some(LinkLine::Log("partial".into()))
        );
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_codec_discards_long_lines() {
        let mut codec = LinkCodec::new();
        let mut bytes = BytesMut::from(vec![b'a'; MAX_LINE_LENGTH + 10].as_slice());
        assert_eq!(codec.decode(&mut bytes).unwrap(), None);
        assert!(bytes.is_empty());

        bytes.extend_from_slice(b"tail of the long line\nr: ff\n");
        assert_eq!(codec.decode(&mut bytes).unwrap(), Some(LinkLine::Received(vec![0xff])));
    }

    #[test]
    fn test_codec_encode() {
        let mut codec = LinkCodec::new();
        let mut bytes = BytesMut::new();
        codec.encode(LinkLine::Received(vec![0xab, 0xcd]), &mut bytes).unwrap();
        codec.encode(LinkLine::Log("ok".into()), &mut bytes).unwrap();
        assert_eq!(&bytes[..], b"r: abcd\nok\n");
    }
}
