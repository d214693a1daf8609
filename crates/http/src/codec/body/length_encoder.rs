use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let remaining = bytes.remaining() as u64;
                if remaining > self.length {
                    warn!(announced = self.length, received = remaining, "body longer than its content-length, truncating");
                }

                let mut take = remaining.min(self.length) as usize;
                self.length -= take as u64;
                while take > 0 {
                    let chunk = bytes.chunk();
                    let n = chunk.len().min(take);
                    dst.extend_from_slice(&chunk[..n]);
                    bytes.advance(n);
                    take -= n;
                }
                Ok(())
            }
            PayloadItem::Eof => {
                if self.length > 0 {
                    warn!(missing = self.length, "body shorter than its content-length");
                }
                self.eof = true;
                Ok(())
            }
        }
    }
}
