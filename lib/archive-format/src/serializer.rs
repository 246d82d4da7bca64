use crate::error::ArchiveError;

/// A cursor over a byte buffer that can run in three modes: measuring the
/// encoded size without touching any bytes, encoding into a caller-owned
/// buffer, or decoding out of one.
///
/// The same call sequence is used for all three modes, which is what gives
/// the round-trip law (`decode(encode(x)) == x`) for free: a type that writes
/// itself out via [`Serializer::u32`]/[`Serializer::bytes`]/[`Serializer::cstr`]
/// reads itself back the same way.
pub enum Serializer<'a> {
    Measure { pos: usize },
    Encode { buf: &'a mut [u8], pos: usize },
    Decode { buf: &'a [u8], pos: usize },
}

impl<'a> Serializer<'a> {
    pub fn measure() -> Self {
        Serializer::Measure { pos: 0 }
    }

    pub fn encoder(buf: &'a mut [u8]) -> Self {
        Serializer::Encode { buf, pos: 0 }
    }

    pub fn decoder(buf: &'a [u8]) -> Self {
        Serializer::Decode { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        match self {
            Serializer::Measure { pos } => *pos,
            Serializer::Encode { pos, .. } => *pos,
            Serializer::Decode { pos, .. } => *pos,
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Serializer::Measure { .. } => None,
            Serializer::Encode { buf, .. } => Some(buf.len()),
            Serializer::Decode { buf, .. } => Some(buf.len()),
        }
    }

    pub fn is_end(&self) -> bool {
        match self.len() {
            Some(len) => self.pos() >= len,
            None => false,
        }
    }

    pub fn remaining(&self) -> usize {
        match self.len() {
            Some(len) => len.saturating_sub(self.pos()),
            None => usize::MAX,
        }
    }

    /// Checks that `n` more bytes are available and, if so, advances the
    /// cursor. Must be called before touching the underlying buffer.
    fn check(&self, n: usize) -> Result<(), ArchiveError> {
        if let Some(len) = self.len() {
            let pos = self.pos();
            if pos + n > len {
                return Err(ArchiveError::DecodeUnderflow {
                    needed: n,
                    remaining: len.saturating_sub(pos),
                });
            }
        }
        Ok(())
    }

    fn bump(&mut self, n: usize) {
        match self {
            Serializer::Measure { pos } => *pos += n,
            Serializer::Encode { pos, .. } => *pos += n,
            Serializer::Decode { pos, .. } => *pos += n,
        }
    }

    /// Raw fixed-size byte field. In measure mode only the length of `v`
    /// matters; in encode mode `v` is copied into the buffer; in decode mode
    /// the buffer is copied into `v`.
    pub fn bytes(&mut self, v: &mut [u8]) -> Result<(), ArchiveError> {
        let n = v.len();
        self.check(n)?;
        let pos = self.pos();
        match self {
            Serializer::Measure { .. } => {}
            Serializer::Encode { buf, .. } => buf[pos..pos + n].copy_from_slice(v),
            Serializer::Decode { buf, .. } => v.copy_from_slice(&buf[pos..pos + n]),
        }
        self.bump(n);
        Ok(())
    }

    pub fn u8(&mut self, v: &mut u8) -> Result<(), ArchiveError> {
        let mut tmp = [*v];
        self.bytes(&mut tmp)?;
        *v = tmp[0];
        Ok(())
    }

    pub fn u32(&mut self, v: &mut u32) -> Result<(), ArchiveError> {
        let mut tmp = v.to_le_bytes();
        self.bytes(&mut tmp)?;
        *v = u32::from_le_bytes(tmp);
        Ok(())
    }

    pub fn u64(&mut self, v: &mut u64) -> Result<(), ArchiveError> {
        let mut tmp = v.to_le_bytes();
        self.bytes(&mut tmp)?;
        *v = u64::from_le_bytes(tmp);
        Ok(())
    }

    pub fn i32(&mut self, v: &mut i32) -> Result<(), ArchiveError> {
        let mut tmp = v.to_le_bytes();
        self.bytes(&mut tmp)?;
        *v = i32::from_le_bytes(tmp);
        Ok(())
    }

    pub fn f32(&mut self, v: &mut f32) -> Result<(), ArchiveError> {
        let mut tmp = v.to_le_bytes();
        self.bytes(&mut tmp)?;
        *v = f32::from_le_bytes(tmp);
        Ok(())
    }

    /// A length-prefixed array of `u32`s, used for the shader-index list and
    /// similar repeat-count arrays.
    pub fn u32_array(&mut self, v: &mut Vec<u32>) -> Result<(), ArchiveError> {
        let mut count = v.len() as u32;
        self.u32(&mut count)?;
        match self {
            Serializer::Decode { .. } => {
                v.clear();
                v.reserve(count as usize);
                for _ in 0..count {
                    let mut x = 0u32;
                    self.u32(&mut x)?;
                    v.push(x);
                }
            }
            _ => {
                for x in v.iter() {
                    let mut x = *x;
                    self.u32(&mut x)?;
                }
            }
        }
        Ok(())
    }

    /// A NUL-terminated string. In decode mode the returned bytes alias the
    /// source buffer directly (no copy) up to, but excluding, the NUL byte —
    /// callers that need to retain the string past the buffer's lifetime must
    /// copy it (e.g. into the [`crate::alloc::LinearAllocator`]).
    pub fn cstr_encode(&mut self, v: &str) -> Result<(), ArchiveError> {
        let bytes = v.as_bytes();
        self.check(bytes.len() + 1)?;
        let pos = self.pos();
        match self {
            Serializer::Measure { .. } => {}
            Serializer::Encode { buf, .. } => {
                buf[pos..pos + bytes.len()].copy_from_slice(bytes);
                buf[pos + bytes.len()] = 0;
            }
            Serializer::Decode { .. } => unreachable!("cstr_encode called on a decoder"),
        }
        self.bump(bytes.len() + 1);
        Ok(())
    }

    pub fn cstr_decode(&mut self) -> Result<&'a str, ArchiveError> {
        match self {
            Serializer::Decode { buf, pos } => {
                let start = *pos;
                let nul = buf[start..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(ArchiveError::DecodeUnderflow {
                        needed: 1,
                        remaining: 0,
                    })?;
                let end = start + nul;
                let s = std::str::from_utf8(&buf[start..end])
                    .map_err(|_| ArchiveError::DecodeUnderflow {
                        needed: 0,
                        remaining: buf.len() - start,
                    })?;
                *pos = end + 1;
                if *pos > buf.len() {
                    return Err(ArchiveError::DecodeUnderflow {
                        needed: 1,
                        remaining: 0,
                    });
                }
                Ok(s)
            }
            _ => unreachable!("cstr_decode called outside decode mode"),
        }
    }
}
