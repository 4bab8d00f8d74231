//! Little-endian wire primitives for the transaction format.

use crate::error::TransactionError;

/// Append a CompactSize varint.
pub fn write_varint(buf: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(0xfd);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(0xfe);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}

/// Encoded length of a CompactSize varint.
pub const fn varint_len(n: u64) -> u64 {
    if n < 0xfd {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffff_ffff {
        5
    } else {
        9
    }
}

/// Append a length-prefixed byte string.
pub fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Cursor over a byte slice with bounds-checked reads.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Look at the next `n` bytes without consuming them.
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.buf.get(self.pos..self.pos.checked_add(n)?)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], TransactionError> {
        let slice = self.peek(n).ok_or(TransactionError::Truncated {
            offset: self.pos,
            needed: n,
        })?;
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, TransactionError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, TransactionError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, TransactionError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, TransactionError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a CompactSize varint, rejecting non-minimal encodings.
    pub fn read_varint(&mut self) -> Result<u64, TransactionError> {
        let start = self.pos;
        let n = match self.read_u8()? {
            0xfd => {
                let v = self.read_u16_le()? as u64;
                if v < 0xfd {
                    return Err(TransactionError::NonCanonicalVarint(start));
                }
                v
            }
            0xfe => {
                let v = self.read_u32_le()? as u64;
                if v <= 0xffff {
                    return Err(TransactionError::NonCanonicalVarint(start));
                }
                v
            }
            0xff => {
                let v = self.read_u64_le()?;
                if v <= 0xffff_ffff {
                    return Err(TransactionError::NonCanonicalVarint(start));
                }
                v
            }
            small => small as u64,
        };
        Ok(n)
    }

    /// Read an element count, rejecting counts that cannot fit in the
    /// remaining buffer given a minimum encoded size per element.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, TransactionError> {
        let count = self.read_varint()?;
        let remaining = self.remaining();
        let plausible = (remaining / min_element_size.max(1)) as u64;
        if count > plausible {
            return Err(TransactionError::ImplausibleCount { count, remaining });
        }
        Ok(count as usize)
    }

    /// Read a varint-length-prefixed byte string.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], TransactionError> {
        let len = self.read_count(1)?;
        self.read_bytes(len)
    }
}
