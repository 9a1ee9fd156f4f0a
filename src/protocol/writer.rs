//! Hand-rolled binary codec
//!
//! Little-endian, length-prefixed primitives over a reusable buffer.
//! `DataWriter` is the purpose-built serializer used both for wire packets
//! and as the hand-coded strategy in the serializer benchmark; `DataReader`
//! is its cursor-style counterpart.

/// Reusable write buffer.
///
/// `reset()` + `as_bytes()` allow one writer to serve many packets without
/// reallocating once it has grown to its working size.
pub struct DataWriter {
    data: Vec<u8>,
}

impl DataWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Reset writer for reuse. Capacity is retained.
    #[inline(always)]
    pub fn reset(&mut self) {
        self.data.clear();
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    pub fn put_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    #[inline(always)]
    pub fn put_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    #[inline(always)]
    pub fn put_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    #[inline(always)]
    pub fn put_u64(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    #[inline(always)]
    pub fn put_i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    #[inline(always)]
    pub fn put_f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    /// Raw bytes, no length prefix.
    #[inline(always)]
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// UTF-8 string with a u16 byte-length prefix.
    #[inline]
    pub fn put_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.put_u16(len as u16);
        self.data.extend_from_slice(&bytes[..len]);
    }

    /// i32 sequence with a u16 element-count prefix.
    #[inline]
    pub fn put_i32_slice(&mut self, values: &[i32]) {
        let count = values.len().min(u16::MAX as usize);
        self.put_u16(count as u16);
        for &v in &values[..count] {
            self.put_i32(v);
        }
    }
}

impl Default for DataWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor-style reader over a byte slice.
///
/// Every accessor returns `None` on underflow without advancing the cursor.
/// A malformed packet is dropped wholesale, nothing resynchronizes
/// mid-buffer.
pub struct DataReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DataReader<'a> {
    #[inline(always)]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Take the next `n` bytes, advancing the cursor.
    #[inline(always)]
    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    /// Take everything left, advancing the cursor to the end.
    #[inline(always)]
    pub fn take_rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    #[inline(always)]
    pub fn get_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    #[inline(always)]
    pub fn get_u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    #[inline(always)]
    pub fn get_u32(&mut self) -> Option<u32> {
        self.take(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    #[inline(always)]
    pub fn get_u64(&mut self) -> Option<u64> {
        self.take(8).map(|b| {
            u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })
    }

    #[inline(always)]
    pub fn get_i32(&mut self) -> Option<i32> {
        self.get_u32().map(|v| v as i32)
    }

    #[inline(always)]
    pub fn get_f32(&mut self) -> Option<f32> {
        self.get_u32().map(f32::from_bits)
    }

    /// Length-prefixed UTF-8 string, rejected when longer than `max_len`
    /// bytes or not valid UTF-8.
    pub fn get_str(&mut self, max_len: usize) -> Option<String> {
        let len = self.get_u16()? as usize;
        if len > max_len {
            return None;
        }
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).ok().map(str::to_owned)
    }

    /// Count-prefixed i32 sequence.
    pub fn get_i32_slice(&mut self) -> Option<Vec<i32>> {
        let count = self.get_u16()? as usize;
        if self.remaining() < count * 4 {
            return None;
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.get_i32()?);
        }
        Some(values)
    }
}
