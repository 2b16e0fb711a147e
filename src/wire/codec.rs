use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Largest message the transport carries. Anything bigger is rejected on decode.
pub const MAX_MESSAGE_LEN: usize = 102400;

/// Encoder writes one tagged message. Integers are little endian u32, strings are a u32 byte
/// length followed by UTF-8.
pub(crate) struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub(crate) fn new(tag: u8) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(tag);
        Encoder { buf }
    }

    pub(crate) fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub(crate) fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32_le(value);
        self
    }

    pub(crate) fn put_len(&mut self, len: usize) -> &mut Self {
        self.put_u32(len as u32)
    }

    pub(crate) fn put_str(&mut self, value: &str) -> &mut Self {
        self.put_len(value.len());
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub(crate) fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Decoder is the bounds checked reading half of `Encoder`. Every read fails cleanly instead of
/// reading past the end of the message.
pub(crate) struct Decoder {
    buf: Bytes,
}

impl Decoder {
    /// Start decoding `bytes`, returning the message tag.
    pub(crate) fn new(bytes: Bytes) -> Result<(u8, Self), DecodeError> {
        if bytes.len() > MAX_MESSAGE_LEN {
            return Err(DecodeError::TooLarge(bytes.len()));
        }

        let mut decoder = Decoder { buf: bytes };
        let tag = decoder.get_u8()?;
        Ok((tag, decoder))
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            Err(DecodeError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub(crate) fn get_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn get_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Read an element count. Each element takes at least `min_element_len` bytes, which bounds
    /// the count by what is left in the message.
    pub(crate) fn get_len(&mut self, min_element_len: usize) -> Result<usize, DecodeError> {
        let len = self.get_u32()? as usize;
        self.ensure(len.saturating_mul(min_element_len))?;
        Ok(len)
    }

    pub(crate) fn get_str(&mut self) -> Result<String, DecodeError> {
        let len = self.get_len(1)?;
        let raw = self.buf.copy_to_bytes(len);
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Fail if anything is left over.
    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("message of {0} bytes is larger than the maximum")]
    TooLarge(usize),
    #[error("message truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),
    #[error("{0} unexpected bytes after message")]
    TrailingBytes(usize),
    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}
