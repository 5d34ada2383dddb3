//! PICA200 GPU command stream interpreter.
//!
//! A command block is a list of register writes. Nothing is executed; the
//! interpreter keeps the last value written to each register and the float
//! uniforms pushed to each vertex shader uniform register, and exposes typed
//! views over them (vertex layout, index buffer, texture units).

use glam::Vec4;

use crate::error::{Error, Result};
use crate::utils::reader::u32_at;

/// Register ids used by the decoder.
pub mod reg {
    pub const TEX_UNIT0_SIZE: u16 = 0x0082;
    pub const TEX_UNIT0_ADDRESS: u16 = 0x0085;
    pub const TEX_UNIT0_TYPE: u16 = 0x008E;
    pub const TEX_UNIT1_SIZE: u16 = 0x0092;
    pub const TEX_UNIT1_ADDRESS: u16 = 0x0095;
    pub const TEX_UNIT1_TYPE: u16 = 0x0096;
    pub const TEX_UNIT2_SIZE: u16 = 0x009A;
    pub const TEX_UNIT2_ADDRESS: u16 = 0x009D;
    pub const TEX_UNIT2_TYPE: u16 = 0x009E;

    pub const ATTRIBUTES_BASE_ADDRESS: u16 = 0x0200;
    pub const ATTRIBUTES_FORMAT_LOW: u16 = 0x0201;
    pub const ATTRIBUTES_FORMAT_HIGH: u16 = 0x0202;
    pub const ATTRIBUTES_BUFFER0_ADDRESS: u16 = 0x0203;
    pub const ATTRIBUTES_BUFFER0_PERMUTATION: u16 = 0x0204;
    pub const ATTRIBUTES_BUFFER0_STRIDE: u16 = 0x0205;

    pub const INDEX_BUFFER_CONFIG: u16 = 0x0227;
    pub const INDEX_BUFFER_COUNT: u16 = 0x0228;
    pub const BLOCK_END: u16 = 0x023D;

    pub const ATTRIBUTES_PERMUTATION_LOW: u16 = 0x02BB;
    pub const ATTRIBUTES_PERMUTATION_HIGH: u16 = 0x02BC;

    pub const VSH_FLOAT_UNIFORM_CONFIG: u16 = 0x02C0;
    pub const VSH_FLOAT_UNIFORM_DATA: u16 = 0x02C1;
    /// Exclusive end of the eight uniform data registers.
    pub const VSH_FLOAT_UNIFORM_DATA_END: u16 = 0x02C9;
}

const REGISTER_COUNT: usize = 0x1_0000;
const UNIFORM_REGISTER_COUNT: usize = 96;
/// Values kept per uniform register; older values are dropped when full.
pub const UNIFORM_STACK_DEPTH: usize = 16;

/// Uniform register holding the position offset vector.
pub const POSITION_OFFSET_UNIFORM: usize = 6;
/// Uniform register holding the eight attribute scale factors.
pub const SCALE_UNIFORM: usize = 7;

/// Fixed-capacity LIFO of float values written to one uniform register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformStack {
    values: [f32; UNIFORM_STACK_DEPTH],
    len: usize,
}

impl Default for UniformStack {
    fn default() -> Self {
        Self {
            values: [0.0; UNIFORM_STACK_DEPTH],
            len: 0,
        }
    }
}

impl UniformStack {
    /// Push a value; when full the oldest value is discarded.
    pub fn push(&mut self, value: f32) {
        if self.len == UNIFORM_STACK_DEPTH {
            self.values.copy_within(1.., 0);
            self.len -= 1;
        }
        self.values[self.len] = value;
        self.len += 1;
    }

    /// Pop the most recently pushed value.
    pub fn pop(&mut self) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.values[self.len])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Numeric encoding of one attribute slot with its component count (1-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    SignedByte(u8),
    UnsignedByte(u8),
    SignedShort(u8),
    Float(u8),
}

impl AttributeFormat {
    /// Decode a 4-bit format nibble: low two bits type, high two bits
    /// component count minus one.
    #[must_use]
    pub fn from_nibble(nibble: u8) -> Self {
        let components = ((nibble >> 2) & 3) + 1;
        match nibble & 3 {
            0 => Self::SignedByte(components),
            1 => Self::UnsignedByte(components),
            2 => Self::SignedShort(components),
            _ => Self::Float(components),
        }
    }

    #[must_use]
    pub fn components(self) -> usize {
        match self {
            Self::SignedByte(n) | Self::UnsignedByte(n) | Self::SignedShort(n) | Self::Float(n) => {
                usize::from(n)
            }
        }
    }

    #[must_use]
    pub fn component_size(self) -> usize {
        match self {
            Self::SignedByte(_) | Self::UnsignedByte(_) => 1,
            Self::SignedShort(_) => 2,
            Self::Float(_) => 4,
        }
    }

    #[must_use]
    pub fn byte_size(self) -> usize {
        self.components() * self.component_size()
    }

    /// Same encoding as unsigned bytes, keeping the component count.
    #[must_use]
    pub fn as_unsigned_byte(self) -> Self {
        Self::UnsignedByte(self.components() as u8)
    }

    /// Read the raw components at the start of `bytes`. Missing components
    /// are zero.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedEof`] if `bytes` is shorter than
    /// [`AttributeFormat::byte_size`].
    pub fn read(self, bytes: &[u8], offset: usize) -> Result<Vec4> {
        let size = self.byte_size();
        let raw = bytes.get(..size).ok_or(Error::UnexpectedEof {
            offset,
            needed: size,
        })?;
        let mut out = [0.0f32; 4];
        for (i, value) in out.iter_mut().enumerate().take(self.components()) {
            *value = match self {
                Self::SignedByte(_) => f32::from(raw[i] as i8),
                Self::UnsignedByte(_) => f32::from(raw[i]),
                Self::SignedShort(_) => f32::from(i16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]])),
                Self::Float(_) => f32::from_le_bytes([
                    raw[i * 4],
                    raw[i * 4 + 1],
                    raw[i * 4 + 2],
                    raw[i * 4 + 3],
                ]),
            };
        }
        Ok(Vec4::from_array(out))
    }
}

/// Logical meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    Color,
    TexCoord0,
    TexCoord1,
    TexCoord2,
    BoneIndex,
    BoneWeight,
    /// User attribute the decoder does not interpret.
    Other(u8),
}

impl VertexSemantic {
    #[must_use]
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble {
            0 => Self::Position,
            1 => Self::Normal,
            2 => Self::Tangent,
            3 => Self::Color,
            4 => Self::TexCoord0,
            5 => Self::TexCoord1,
            6 => Self::TexCoord2,
            7 => Self::BoneIndex,
            8 => Self::BoneWeight,
            other => Self::Other(other),
        }
    }
}

/// One resolved attribute of the interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Physical attribute slot (index into the format table).
    pub slot: u8,
    pub semantic: VertexSemantic,
    pub format: AttributeFormat,
    /// Byte offset inside one vertex.
    pub offset: usize,
}

/// Resolved layout of vertex buffer 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeLayout {
    pub base_address: u32,
    pub buffer_address: u32,
    pub stride: usize,
    pub attributes: Vec<VertexAttribute>,
}

impl AttributeLayout {
    #[must_use]
    pub fn has(&self, semantic: VertexSemantic) -> bool {
        self.attributes.iter().any(|a| a.semantic == semantic)
    }
}

/// Index element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Byte,
    Short,
}

impl IndexFormat {
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
        }
    }
}

/// Index buffer descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBuffer {
    pub address: u32,
    pub format: IndexFormat,
    pub count: u32,
}

/// Texture unit descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureUnit {
    pub address: u32,
    pub format: u32,
    pub width: u32,
    pub height: u32,
}

/// Position offset and scale factors from the vertex shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexUniforms {
    pub position_offset: Vec4,
    pub texture0_scale: f32,
    pub texture1_scale: f32,
    pub texture2_scale: f32,
    pub bone_weight_scale: f32,
    pub position_scale: f32,
    pub normal_scale: f32,
    pub tangent_scale: f32,
    pub color_scale: f32,
}

impl Default for VertexUniforms {
    fn default() -> Self {
        Self {
            position_offset: Vec4::ZERO,
            texture0_scale: 1.0,
            texture1_scale: 1.0,
            texture2_scale: 1.0,
            bone_weight_scale: 1.0,
            position_scale: 1.0,
            normal_scale: 1.0,
            tangent_scale: 1.0,
            color_scale: 1.0,
        }
    }
}

/// Register state after running a command block.
#[derive(Debug, Clone)]
pub struct GpuCommandInterpreter {
    registers: Vec<u32>,
    uniforms: Vec<UniformStack>,
    current_uniform: usize,
}

impl Default for GpuCommandInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand a 4-bit byte-enable mask to a 32-bit mask.
fn byte_mask(mask: u32) -> u32 {
    (0..4)
        .filter(|bit| mask & (1 << bit) != 0)
        .fold(0, |acc, bit| acc | (0xFF << (bit * 8)))
}

impl GpuCommandInterpreter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: vec![0; REGISTER_COUNT],
            uniforms: vec![UniformStack::default(); UNIFORM_REGISTER_COUNT],
            current_uniform: 0,
        }
    }

    /// Interpret `word_count` words of commands starting at `offset`.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedEof`] if the block runs past the buffer.
    pub fn run(data: &[u8], offset: usize, word_count: usize) -> Result<Self> {
        let mut interpreter = Self::new();
        interpreter.execute(data, offset, word_count)?;
        Ok(interpreter)
    }

    /// Interpret a command block on top of the current state.
    ///
    /// Each command is a parameter word followed by a header word (register
    /// id, byte-enable mask, extra parameter count, consecutive flag), then
    /// the extra parameters, padded to 8 bytes. The block stops early at
    /// [`reg::BLOCK_END`].
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedEof`] if the block runs past the buffer.
    pub fn execute(&mut self, data: &[u8], offset: usize, word_count: usize) -> Result<()> {
        let mut pos = offset;
        let mut read = 0usize;

        while read < word_count {
            let parameter = u32_at(data, pos)?;
            let header = u32_at(data, pos + 4)?;
            pos += 8;
            read += 2;

            let mut id = (header & 0xFFFF) as u16;
            let mask = byte_mask((header >> 16) & 0xF);
            let extra = ((header >> 20) & 0x7FF) as usize;
            let consecutive = header & 0x8000_0000 != 0;

            self.write(id, parameter, mask);
            if id == reg::BLOCK_END {
                break;
            }

            for _ in 0..extra {
                if consecutive {
                    id = id.wrapping_add(1);
                }
                let value = u32_at(data, pos)?;
                pos += 4;
                read += 1;
                self.write(id, value, mask);
            }

            if pos % 8 != 0 {
                pos += 4;
                read += 1;
            }
        }
        Ok(())
    }

    fn write(&mut self, id: u16, value: u32, mask: u32) {
        let slot = &mut self.registers[usize::from(id)];
        *slot = (*slot & !mask) | (value & mask);
        let written = *slot;

        if id == reg::VSH_FLOAT_UNIFORM_CONFIG {
            self.current_uniform = (written & 0x7FFF_FFFF) as usize;
        } else if (reg::VSH_FLOAT_UNIFORM_DATA..reg::VSH_FLOAT_UNIFORM_DATA_END).contains(&id) {
            if let Some(stack) = self.uniforms.get_mut(self.current_uniform) {
                stack.push(f32::from_bits(written));
            }
        }
    }

    /// Last value written to register `id`.
    #[must_use]
    pub fn register(&self, id: u16) -> u32 {
        self.registers[usize::from(id)]
    }

    /// Mutable access to the value stack of uniform register `index`.
    pub fn uniform_stack(&mut self, index: usize) -> Option<&mut UniformStack> {
        self.uniforms.get_mut(index)
    }

    /// Pop the position offset (register 6) and the eight scale factors
    /// (register 7). Missing values fall back to zero offset and unit scale.
    pub fn vertex_uniforms(&mut self) -> VertexUniforms {
        let defaults = VertexUniforms::default();

        let offset = &mut self.uniforms[POSITION_OFFSET_UNIFORM];
        let x = offset.pop().unwrap_or(0.0);
        let y = offset.pop().unwrap_or(0.0);
        let z = offset.pop().unwrap_or(0.0);
        let w = offset.pop().unwrap_or(0.0);

        let scales = &mut self.uniforms[SCALE_UNIFORM];
        VertexUniforms {
            position_offset: Vec4::new(x, y, z, w),
            texture0_scale: scales.pop().unwrap_or(defaults.texture0_scale),
            texture1_scale: scales.pop().unwrap_or(defaults.texture1_scale),
            texture2_scale: scales.pop().unwrap_or(defaults.texture2_scale),
            bone_weight_scale: scales.pop().unwrap_or(defaults.bone_weight_scale),
            position_scale: scales.pop().unwrap_or(defaults.position_scale),
            normal_scale: scales.pop().unwrap_or(defaults.normal_scale),
            tangent_scale: scales.pop().unwrap_or(defaults.tangent_scale),
            color_scale: scales.pop().unwrap_or(defaults.color_scale),
        }
    }

    fn u64_pair(&self, low: u16, high: u16) -> u64 {
        u64::from(self.register(low)) | (u64::from(self.register(high)) << 32)
    }

    /// Per-slot format table (12 slots, one nibble each).
    #[must_use]
    pub fn attribute_formats(&self) -> [AttributeFormat; 12] {
        let packed = self.u64_pair(reg::ATTRIBUTES_FORMAT_LOW, reg::ATTRIBUTES_FORMAT_HIGH);
        std::array::from_fn(|slot| AttributeFormat::from_nibble(((packed >> (slot * 4)) & 0xF) as u8))
    }

    /// Resolve the layout of vertex buffer 0.
    ///
    /// For each attribute `i` of the buffer, the buffer permutation names a
    /// physical slot; the slot's format comes from the format table and its
    /// semantic from the main permutation table.
    ///
    /// # Errors
    /// Returns [`Error::InvalidAttributeLayout`] if the stride or attribute
    /// count registers were never written.
    pub fn attribute_layout(&self) -> Result<AttributeLayout> {
        let stride_reg = self.register(reg::ATTRIBUTES_BUFFER0_STRIDE);
        let stride = ((stride_reg >> 16) & 0xFF) as usize;
        let total = (stride_reg >> 28) as usize;
        if stride == 0 || total == 0 {
            return Err(Error::InvalidAttributeLayout {
                message: format!("stride {stride}, {total} attributes"),
            });
        }

        let buffer_permutation = u64::from(self.register(reg::ATTRIBUTES_BUFFER0_PERMUTATION))
            | (u64::from(stride_reg & 0xFFFF) << 32);
        let main_permutation =
            self.u64_pair(reg::ATTRIBUTES_PERMUTATION_LOW, reg::ATTRIBUTES_PERMUTATION_HIGH);
        let formats = self.attribute_formats();

        let mut attributes = Vec::with_capacity(total);
        let mut offset = 0usize;
        for i in 0..total {
            let slot = ((buffer_permutation >> (i * 4)) & 0xF) as u8;
            let semantic =
                VertexSemantic::from_nibble(((main_permutation >> (u32::from(slot) * 4)) & 0xF) as u8);
            let mut format = *formats.get(usize::from(slot)).ok_or_else(|| {
                Error::InvalidAttributeLayout {
                    message: format!("attribute slot {slot} has no format"),
                }
            })?;
            if semantic == VertexSemantic::BoneWeight {
                format = format.as_unsigned_byte();
            }
            attributes.push(VertexAttribute {
                slot,
                semantic,
                format,
                offset,
            });
            offset += format.byte_size();
        }

        if offset > stride {
            return Err(Error::InvalidAttributeLayout {
                message: format!("attributes need {offset} bytes but stride is {stride}"),
            });
        }

        Ok(AttributeLayout {
            base_address: self.register(reg::ATTRIBUTES_BASE_ADDRESS),
            buffer_address: self.register(reg::ATTRIBUTES_BUFFER0_ADDRESS),
            stride,
            attributes,
        })
    }

    #[must_use]
    pub fn index_buffer(&self) -> IndexBuffer {
        let config = self.register(reg::INDEX_BUFFER_CONFIG);
        IndexBuffer {
            address: config & 0x7FFF_FFFF,
            format: if config >> 31 == 1 {
                IndexFormat::Short
            } else {
                IndexFormat::Byte
            },
            count: self.register(reg::INDEX_BUFFER_COUNT),
        }
    }

    /// Descriptor of texture unit 0, 1 or 2. Other units read as empty.
    #[must_use]
    pub fn texture_unit(&self, unit: usize) -> TextureUnit {
        let (address, size, format) = match unit {
            0 => (reg::TEX_UNIT0_ADDRESS, reg::TEX_UNIT0_SIZE, reg::TEX_UNIT0_TYPE),
            1 => (reg::TEX_UNIT1_ADDRESS, reg::TEX_UNIT1_SIZE, reg::TEX_UNIT1_TYPE),
            2 => (reg::TEX_UNIT2_ADDRESS, reg::TEX_UNIT2_SIZE, reg::TEX_UNIT2_TYPE),
            _ => return TextureUnit::default(),
        };
        let size = self.register(size);
        TextureUnit {
            address: self.register(address),
            format: self.register(format),
            width: size >> 16,
            height: size & 0xFFFF,
        }
    }
}

/// Name of a PICA200 texture format id.
#[must_use]
pub fn texture_format_name(format: u32) -> &'static str {
    match format {
        0 => "RGBA8",
        1 => "RGB8",
        2 => "RGBA5551",
        3 => "RGB565",
        4 => "RGBA4",
        5 => "LA8",
        6 => "HILO8",
        7 => "L8",
        8 => "A8",
        9 => "LA4",
        10 => "L4",
        11 => "A4",
        12 => "ETC1",
        13 => "ETC1A4",
        _ => "unknown",
    }
}
