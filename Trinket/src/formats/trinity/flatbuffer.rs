//! Minimal read-only flatbuffer access.
//!
//! Only what the Trinity descriptors need: root lookup, vtable field
//! resolution, scalars, strings, inline structs and vectors. Every read is
//! bounds-checked against the buffer.

use crate::error::{Error, Result};
use crate::utils::reader::{f32_at, i32_at, slice_at, u16_at, u32_at};

/// Size of the vtable header (`vtable size`, `table size`).
const VTABLE_HEADER: usize = 4;

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidDescriptor {
        kind: "flatbuffer",
        message: message.into(),
    }
}

/// Follow the `u32` forward offset stored at `at`.
fn follow(data: &[u8], at: usize) -> Result<usize> {
    Ok(at + u32_at(data, at)? as usize)
}

fn string_at(data: &[u8], at: usize) -> Result<String> {
    let len = u32_at(data, at)? as usize;
    let bytes = slice_at(data, at + 4, len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// A table inside a flatbuffer.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Table<'a> {
    /// The root table of `data`.
    ///
    /// # Errors
    /// Returns an error if the root offset lies outside the buffer.
    pub fn root(data: &'a [u8]) -> Result<Self> {
        let pos = follow(data, 0)?;
        Self::at(data, pos)
    }

    fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        if pos + 4 > data.len() {
            return Err(invalid(format!("table offset 0x{pos:x} out of bounds")));
        }
        Ok(Self { data, pos })
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute position of field `slot`, or `None` if it is absent.
    fn field(&self, slot: usize) -> Result<Option<usize>> {
        let soffset = i64::from(i32_at(self.data, self.pos)?);
        let vtable = usize::try_from(self.pos as i64 - soffset)
            .map_err(|_| invalid(format!("vtable of table 0x{:x} before buffer", self.pos)))?;
        let vtable_size = usize::from(u16_at(self.data, vtable)?);

        let entry = VTABLE_HEADER + slot * 2;
        if entry + 2 > vtable_size {
            return Ok(None);
        }
        match u16_at(self.data, vtable + entry)? {
            0 => Ok(None),
            offset => Ok(Some(self.pos + usize::from(offset))),
        }
    }

    pub fn has(&self, slot: usize) -> Result<bool> {
        Ok(self.field(slot)?.is_some())
    }

    pub fn u8(&self, slot: usize, default: u8) -> Result<u8> {
        match self.field(slot)? {
            Some(at) => Ok(slice_at(self.data, at, 1)?[0]),
            None => Ok(default),
        }
    }

    pub fn bool(&self, slot: usize) -> Result<bool> {
        Ok(self.u8(slot, 0)? != 0)
    }

    pub fn u16(&self, slot: usize, default: u16) -> Result<u16> {
        self.field(slot)?
            .map_or(Ok(default), |at| u16_at(self.data, at))
    }

    pub fn u32(&self, slot: usize, default: u32) -> Result<u32> {
        self.field(slot)?
            .map_or(Ok(default), |at| u32_at(self.data, at))
    }

    pub fn i32(&self, slot: usize, default: i32) -> Result<i32> {
        self.field(slot)?
            .map_or(Ok(default), |at| i32_at(self.data, at))
    }

    pub fn f32(&self, slot: usize, default: f32) -> Result<f32> {
        self.field(slot)?
            .map_or(Ok(default), |at| f32_at(self.data, at))
    }

    pub fn string(&self, slot: usize) -> Result<Option<String>> {
        match self.field(slot)? {
            Some(at) => Ok(Some(string_at(self.data, follow(self.data, at)?)?)),
            None => Ok(None),
        }
    }

    /// String field, empty when absent.
    pub fn string_or_empty(&self, slot: usize) -> Result<String> {
        Ok(self.string(slot)?.unwrap_or_default())
    }

    pub fn table(&self, slot: usize) -> Result<Option<Table<'a>>> {
        match self.field(slot)? {
            Some(at) => Ok(Some(Self::at(self.data, follow(self.data, at)?)?)),
            None => Ok(None),
        }
    }

    /// An inline struct of `N` floats.
    pub fn f32_struct<const N: usize>(&self, slot: usize) -> Result<Option<[f32; N]>> {
        match self.field(slot)? {
            Some(at) => Ok(Some(read_f32s(self.data, at)?)),
            None => Ok(None),
        }
    }

    pub fn vector(&self, slot: usize) -> Result<Vector<'a>> {
        match self.field(slot)? {
            Some(at) => {
                let start = follow(self.data, at)?;
                let len = u32_at(self.data, start)? as usize;
                Ok(Vector {
                    data: self.data,
                    elements: start + 4,
                    len,
                })
            }
            None => Ok(Vector::empty(self.data)),
        }
    }

    /// Every table of the vector at `slot`.
    pub fn tables(&self, slot: usize) -> Result<Vec<Table<'a>>> {
        let vector = self.vector(slot)?;
        (0..vector.len()).map(|i| vector.table(i)).collect()
    }

    /// Every string of the vector at `slot`.
    pub fn strings(&self, slot: usize) -> Result<Vec<String>> {
        let vector = self.vector(slot)?;
        (0..vector.len()).map(|i| vector.string(i)).collect()
    }
}

fn read_f32s<const N: usize>(data: &[u8], at: usize) -> Result<[f32; N]> {
    let mut values = [0.0; N];
    for (i, value) in values.iter_mut().enumerate() {
        *value = f32_at(data, at + i * 4)?;
    }
    Ok(values)
}

/// A vector inside a flatbuffer.
#[derive(Debug, Clone, Copy)]
pub struct Vector<'a> {
    data: &'a [u8],
    elements: usize,
    len: usize,
}

impl<'a> Vector<'a> {
    fn empty(data: &'a [u8]) -> Self {
        Self {
            data,
            elements: 0,
            len: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(invalid(format!(
                "vector index {index} out of range for length {}",
                self.len
            )));
        }
        Ok(())
    }

    pub fn table(&self, index: usize) -> Result<Table<'a>> {
        self.check(index)?;
        Table::at(self.data, follow(self.data, self.elements + index * 4)?)
    }

    pub fn string(&self, index: usize) -> Result<String> {
        self.check(index)?;
        string_at(self.data, follow(self.data, self.elements + index * 4)?)
    }

    /// The vector's contents as raw bytes (`[ubyte]`).
    pub fn bytes(&self) -> Result<&'a [u8]> {
        if self.len == 0 {
            return Ok(&[]);
        }
        slice_at(self.data, self.elements, self.len)
    }

    /// Every element of a vector of `N`-float structs.
    pub fn f32_structs<const N: usize>(&self) -> Result<Vec<[f32; N]>> {
        (0..self.len)
            .map(|i| read_f32s(self.data, self.elements + i * N * 4))
            .collect()
    }
}

/// Forward-layout flatbuffer writer for test fixtures.
#[cfg(test)]
pub(crate) mod builder {
    /// A field value.
    #[derive(Debug, Clone)]
    pub enum Value {
        /// Scalars and structs, stored in the table.
        Inline(Vec<u8>),
        String(String),
        Table(TableValue),
        Tables(Vec<TableValue>),
        Strings(Vec<String>),
        /// Vector of scalars or structs, given as raw element bytes.
        Vector { len: usize, bytes: Vec<u8> },
    }

    #[derive(Debug, Clone, Default)]
    pub struct TableValue {
        fields: Vec<(usize, Value)>,
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    impl TableValue {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, slot: usize, value: Value) -> Self {
            self.fields.push((slot, value));
            self
        }

        pub fn u8(self, slot: usize, v: u8) -> Self {
            self.with(slot, Value::Inline(vec![v]))
        }

        pub fn u32(self, slot: usize, v: u32) -> Self {
            self.with(slot, Value::Inline(v.to_le_bytes().to_vec()))
        }

        pub fn i32(self, slot: usize, v: i32) -> Self {
            self.with(slot, Value::Inline(v.to_le_bytes().to_vec()))
        }

        pub fn f32s(self, slot: usize, v: &[f32]) -> Self {
            self.with(slot, Value::Inline(f32_bytes(v)))
        }

        pub fn string(self, slot: usize, v: &str) -> Self {
            self.with(slot, Value::String(v.to_string()))
        }

        pub fn table(self, slot: usize, v: TableValue) -> Self {
            self.with(slot, Value::Table(v))
        }

        pub fn tables(self, slot: usize, v: Vec<TableValue>) -> Self {
            self.with(slot, Value::Tables(v))
        }

        pub fn strings(self, slot: usize, v: &[&str]) -> Self {
            self.with(
                slot,
                Value::Strings(v.iter().map(ToString::to_string).collect()),
            )
        }

        pub fn bytes(self, slot: usize, v: &[u8]) -> Self {
            self.with(
                slot,
                Value::Vector {
                    len: v.len(),
                    bytes: v.to_vec(),
                },
            )
        }

        pub fn vec3s(self, slot: usize, v: &[[f32; 3]]) -> Self {
            let flat: Vec<f32> = v.iter().flatten().copied().collect();
            self.with(
                slot,
                Value::Vector {
                    len: v.len(),
                    bytes: f32_bytes(&flat),
                },
            )
        }
    }

    fn align(buf: &mut Vec<u8>, to: usize) {
        while buf.len() % to != 0 {
            buf.push(0);
        }
    }

    fn patch(buf: &mut [u8], at: usize, target: usize) {
        let offset = (target - at) as u32;
        buf[at..at + 4].copy_from_slice(&offset.to_le_bytes());
    }

    fn write_table(buf: &mut Vec<u8>, table: &TableValue) -> usize {
        let slots = table.fields.iter().map(|(s, _)| s + 1).max().unwrap_or(0);
        let mut offsets = vec![0u16; slots];
        let mut size = 4usize;
        for (slot, value) in &table.fields {
            offsets[*slot] = size as u16;
            size += match value {
                Value::Inline(bytes) => bytes.len(),
                _ => 4,
            };
        }

        align(buf, 2);
        let vtable = buf.len();
        buf.extend_from_slice(&((4 + 2 * slots) as u16).to_le_bytes());
        buf.extend_from_slice(&(size as u16).to_le_bytes());
        for offset in offsets {
            buf.extend_from_slice(&offset.to_le_bytes());
        }

        align(buf, 4);
        let pos = buf.len();
        buf.extend_from_slice(&((pos - vtable) as i32).to_le_bytes());
        let mut pending = Vec::new();
        for (_, value) in &table.fields {
            match value {
                Value::Inline(bytes) => buf.extend_from_slice(bytes),
                other => {
                    pending.push((buf.len(), other));
                    buf.extend_from_slice(&[0; 4]);
                }
            }
        }
        for (at, value) in pending {
            let target = write_value(buf, value);
            patch(buf, at, target);
        }
        pos
    }

    fn write_string(buf: &mut Vec<u8>, s: &str) -> usize {
        align(buf, 4);
        let pos = buf.len();
        buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
        pos
    }

    fn write_value(buf: &mut Vec<u8>, value: &Value) -> usize {
        match value {
            Value::Inline(bytes) => {
                let pos = buf.len();
                buf.extend_from_slice(bytes);
                pos
            }
            Value::String(s) => write_string(buf, s),
            Value::Table(table) => write_table(buf, table),
            Value::Tables(tables) => {
                align(buf, 4);
                let pos = buf.len();
                buf.extend_from_slice(&(tables.len() as u32).to_le_bytes());
                let slots = buf.len();
                buf.resize(slots + tables.len() * 4, 0);
                for (i, table) in tables.iter().enumerate() {
                    let target = write_table(buf, table);
                    patch(buf, slots + i * 4, target);
                }
                pos
            }
            Value::Strings(strings) => {
                align(buf, 4);
                let pos = buf.len();
                buf.extend_from_slice(&(strings.len() as u32).to_le_bytes());
                let slots = buf.len();
                buf.resize(slots + strings.len() * 4, 0);
                for (i, s) in strings.iter().enumerate() {
                    let target = write_string(buf, s);
                    patch(buf, slots + i * 4, target);
                }
                pos
            }
            Value::Vector { len, bytes } => {
                align(buf, 4);
                let pos = buf.len();
                buf.extend_from_slice(&(*len as u32).to_le_bytes());
                buf.extend_from_slice(bytes);
                pos
            }
        }
    }

    /// Serialize `root` as a complete buffer.
    pub fn finish(root: &TableValue) -> Vec<u8> {
        let mut buf = vec![0u8; 4];
        let pos = write_table(&mut buf, root);
        patch(&mut buf, 0, pos);
        buf
    }
}
