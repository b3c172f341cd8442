//! Binary decoding primitives

use crate::error::{Error, Result};

/// Read-side primitives of the binary codec
pub trait BinaryDecoder {
    /// Read a null (consumes nothing in the default codec)
    fn read_null(&mut self) -> Result<()>;
    /// Read a boolean
    fn read_boolean(&mut self) -> Result<bool>;
    /// Read a 32-bit integer
    fn read_int(&mut self) -> Result<i32>;
    /// Read a 64-bit integer
    fn read_long(&mut self) -> Result<i64>;
    /// Read a single-precision float
    fn read_float(&mut self) -> Result<f32>;
    /// Read a double-precision float
    fn read_double(&mut self) -> Result<f64>;
    /// Read a length-prefixed byte sequence
    fn read_bytes(&mut self) -> Result<Vec<u8>>;
    /// Read a length-prefixed string
    fn read_string(&mut self) -> Result<String>;
    /// Read an enum ordinal
    fn read_enum(&mut self) -> Result<u32>;
    /// Read a union tag
    fn read_index(&mut self) -> Result<u32>;
    /// Open an array, returning the first block's item count
    fn read_array_start(&mut self) -> Result<u64>;
    /// The next block's item count; zero ends the array
    fn read_array_next(&mut self) -> Result<u64>;
    /// Open a map, returning the first block's entry count
    fn read_map_start(&mut self) -> Result<u64>;
    /// The next block's entry count; zero ends the map
    fn read_map_next(&mut self) -> Result<u64>;
}

/// The default in-memory decoder
#[derive(Debug)]
pub struct ByteBufferDecoder {
    buf: Vec<u8>,
    pos: usize,
}

impl ByteBufferDecoder {
    /// Create a decoder over encoded bytes
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    /// True when every byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::Codec(format!(
                "unexpected end of input at byte {} (needed {})",
                self.pos, n
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_varint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| Error::Codec("unexpected end of varint".to_string()))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(Error::Codec("varint exceeds 64 bits".to_string()));
            }
        }
    }

    fn read_zigzag(&mut self) -> Result<i64> {
        let raw = self.read_varint()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }
}

impl BinaryDecoder for ByteBufferDecoder {
    fn read_null(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_boolean(&mut self) -> Result<bool> {
        let byte = self.take(1)?[0];
        match byte {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::Codec(format!("invalid boolean byte {}", other))),
        }
    }

    fn read_int(&mut self) -> Result<i32> {
        let value = self.read_zigzag()?;
        i32::try_from(value)
            .map_err(|_| Error::Codec(format!("int value {} out of range", value)))
    }

    fn read_long(&mut self) -> Result<i64> {
        self.read_zigzag()
    }

    fn read_float(&mut self) -> Result<f32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(f32::from_le_bytes(bytes))
    }

    fn read_double(&mut self) -> Result<f64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_varint()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| Error::Codec(format!("invalid UTF-8 string: {}", e)))
    }

    fn read_enum(&mut self) -> Result<u32> {
        let value = self.read_zigzag()?;
        u32::try_from(value)
            .map_err(|_| Error::Codec(format!("enum ordinal {} out of range", value)))
    }

    fn read_index(&mut self) -> Result<u32> {
        let value = self.read_zigzag()?;
        u32::try_from(value)
            .map_err(|_| Error::Codec(format!("union tag {} out of range", value)))
    }

    fn read_array_start(&mut self) -> Result<u64> {
        self.read_varint()
    }

    fn read_array_next(&mut self) -> Result<u64> {
        self.read_varint()
    }

    fn read_map_start(&mut self) -> Result<u64> {
        self.read_varint()
    }

    fn read_map_next(&mut self) -> Result<u64> {
        self.read_varint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::encoder::{BinaryEncoder, ByteBufferEncoder};

    #[test]
    fn test_primitive_round_trip() {
        let mut enc = ByteBufferEncoder::new();
        enc.write_boolean(true).unwrap();
        enc.write_int(-42).unwrap();
        enc.write_long(1 << 40).unwrap();
        enc.write_float(1.5).unwrap();
        enc.write_double(-2.25).unwrap();
        enc.write_string("héllo").unwrap();
        enc.write_bytes(&[1, 2, 3]).unwrap();
        enc.write_index(2).unwrap();

        let mut dec = ByteBufferDecoder::new(enc.into_bytes());
        assert!(dec.read_boolean().unwrap());
        assert_eq!(dec.read_int().unwrap(), -42);
        assert_eq!(dec.read_long().unwrap(), 1 << 40);
        assert_eq!(dec.read_float().unwrap(), 1.5);
        assert_eq!(dec.read_double().unwrap(), -2.25);
        assert_eq!(dec.read_string().unwrap(), "héllo");
        assert_eq!(dec.read_bytes().unwrap(), vec![1, 2, 3]);
        assert_eq!(dec.read_index().unwrap(), 2);
        assert!(dec.is_exhausted());
    }

    #[test]
    fn test_array_blocks() {
        let mut enc = ByteBufferEncoder::new();
        enc.write_array_start().unwrap();
        enc.set_item_count(2).unwrap();
        enc.start_item().unwrap();
        enc.write_long(7).unwrap();
        enc.start_item().unwrap();
        enc.write_long(8).unwrap();
        enc.set_item_count(1).unwrap();
        enc.start_item().unwrap();
        enc.write_long(9).unwrap();
        enc.write_array_end().unwrap();

        let mut dec = ByteBufferDecoder::new(enc.into_bytes());
        let mut values = Vec::new();
        let mut count = dec.read_array_start().unwrap();
        while count > 0 {
            for _ in 0..count {
                values.push(dec.read_long().unwrap());
            }
            count = dec.read_array_next().unwrap();
        }
        assert_eq!(values, vec![7, 8, 9]);
        assert!(dec.is_exhausted());
    }

    #[test]
    fn test_truncated_input_fails() {
        let mut dec = ByteBufferDecoder::new(vec![0x80]);
        assert!(dec.read_long().is_err());

        let mut dec = ByteBufferDecoder::new(vec![5, b'a']);
        assert!(dec.read_string().is_err());
    }
}
