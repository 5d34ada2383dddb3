//! Typed Trinity descriptors and the reader that produces them.
//!
//! | Extension | Descriptor |
//! |-----------|------------|
//! | `.trmdl`  | [`ModelDescriptor`] |
//! | `.trmsh`  | [`MeshDescriptor`] |
//! | `.trmbf`  | [`MeshBufferDescriptor`] |
//! | `.trmtr`  | [`MaterialDescriptor`] |
//! | `.trskl`  | [`SkeletonDescriptor`] |
//! | `.tranm`  | [`AnimationDescriptor`] |

use std::path::Path;

use glam::Vec4;
use half::f16;
use serde::{Deserialize, Serialize};

use super::flatbuffer::Table;
use crate::error::{Error, Result};
use crate::utils::reader::{f32_at, slice_at, u16_at, u32_at};

// ============================================================================
// Descriptor Kinds
// ============================================================================

/// File kinds taking part in a Trinity model export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Model,
    Mesh,
    MeshBuffer,
    Material,
    Skeleton,
    Animation,
    Texture,
}

impl DescriptorKind {
    /// Classify a path by its extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        Some(match extension.as_str() {
            "trmdl" => Self::Model,
            "trmsh" => Self::Mesh,
            "trmbf" => Self::MeshBuffer,
            "trmtr" => Self::Material,
            "trskl" => Self::Skeleton,
            "tranm" => Self::Animation,
            "bntx" => Self::Texture,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "trmdl",
            Self::Mesh => "trmsh",
            Self::MeshBuffer => "trmbf",
            Self::Material => "trmtr",
            Self::Skeleton => "trskl",
            Self::Animation => "tranm",
            Self::Texture => "bntx",
        }
    }
}

// ============================================================================
// Descriptor Types
// ============================================================================

/// `.trmdl`: the top-level model file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Mesh descriptor files, relative to the model's directory.
    pub meshes: Vec<String>,
    pub skeleton: Option<String>,
    /// Material descriptor files, relative to the model's directory.
    pub materials: Vec<String>,
}

/// Index width of a mesh shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexType {
    U8,
    #[default]
    U16,
    U32,
}

impl IndexType {
    #[must_use]
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::U8,
            2 => Self::U32,
            _ => Self::U16,
        }
    }

    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Read index `i` from `bytes`.
    pub fn read(self, bytes: &[u8], i: usize) -> Result<u32> {
        let at = i * self.byte_size();
        match self {
            Self::U8 => Ok(u32::from(slice_at(bytes, at, 1)?[0])),
            Self::U16 => Ok(u32::from(u16_at(bytes, at)?)),
            Self::U32 => u32_at(bytes, at),
        }
    }
}

/// What a vertex attribute carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeSemantic {
    Position,
    Normal,
    Tangent,
    Binormal,
    Color,
    TexCoord,
    BlendIndices,
    BlendWeights,
    Unknown(u32),
}

impl AttributeSemantic {
    #[must_use]
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Position,
            2 => Self::Normal,
            3 => Self::Tangent,
            4 => Self::Binormal,
            5 => Self::Color,
            6 => Self::TexCoord,
            7 => Self::BlendIndices,
            8 => Self::BlendWeights,
            other => Self::Unknown(other),
        }
    }
}

/// On-disk encoding of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexFormat {
    Rgba8Unorm,
    Rgba8Uint,
    R32Uint,
    R32Int,
    Rgba16Unorm,
    Rgba16Float,
    Rg32Float,
    Rgb32Float,
    Rgba32Float,
}

impl VertexFormat {
    /// # Errors
    /// Returns [`Error::UnsupportedVertexType`] for unknown type ids.
    pub fn from_u32(value: u32) -> Result<Self> {
        Ok(match value {
            20 => Self::Rgba8Unorm,
            22 => Self::Rgba8Uint,
            36 => Self::R32Uint,
            37 => Self::R32Int,
            39 => Self::Rgba16Unorm,
            43 => Self::Rgba16Float,
            48 => Self::Rg32Float,
            51 => Self::Rgb32Float,
            54 => Self::Rgba32Float,
            other => return Err(Error::UnsupportedVertexType(other)),
        })
    }

    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::Rgba8Unorm | Self::Rgba8Uint | Self::R32Uint | Self::R32Int => 4,
            Self::Rgba16Unorm | Self::Rgba16Float | Self::Rg32Float => 8,
            Self::Rgb32Float => 12,
            Self::Rgba32Float => 16,
        }
    }

    /// Read one value at `offset`. Normalized formats map to `0..=1`, integer
    /// formats keep their integer value; missing components are zero.
    pub fn read(self, bytes: &[u8], offset: usize) -> Result<Vec4> {
        let raw = slice_at(bytes, offset, self.byte_size())?;
        let half_at = |i: usize| u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]);
        Ok(match self {
            Self::Rgba8Unorm => Vec4::from_array(raw_u8x4(raw).map(|v| f32::from(v) / 255.0)),
            Self::Rgba8Uint => Vec4::from_array(raw_u8x4(raw).map(f32::from)),
            Self::R32Uint => Vec4::new(u32_at(raw, 0)? as f32, 0.0, 0.0, 0.0),
            Self::R32Int => Vec4::new(
                i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32,
                0.0,
                0.0,
                0.0,
            ),
            Self::Rgba16Unorm => {
                Vec4::from_array([0, 1, 2, 3].map(|i| f32::from(half_at(i)) / 65535.0))
            }
            Self::Rgba16Float => {
                Vec4::from_array([0, 1, 2, 3].map(|i| f16::from_bits(half_at(i)).to_f32()))
            }
            Self::Rg32Float => Vec4::new(f32_at(raw, 0)?, f32_at(raw, 4)?, 0.0, 0.0),
            Self::Rgb32Float => Vec4::new(f32_at(raw, 0)?, f32_at(raw, 4)?, f32_at(raw, 8)?, 0.0),
            Self::Rgba32Float => Vec4::new(
                f32_at(raw, 0)?,
                f32_at(raw, 4)?,
                f32_at(raw, 8)?,
                f32_at(raw, 12)?,
            ),
        })
    }
}

fn raw_u8x4(raw: &[u8]) -> [u8; 4] {
    [raw[0], raw[1], raw[2], raw[3]]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexAttributeDesc {
    pub semantic: AttributeSemantic,
    /// Set index for repeated semantics (UV sets, colour sets).
    pub layer: u32,
    pub format: VertexFormat,
    /// Byte offset inside one vertex of the stream.
    pub offset: u32,
}

/// One interleaved vertex stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexStream {
    pub attributes: Vec<VertexAttributeDesc>,
    pub stride: u32,
}

/// A range of a shape's index buffer drawn with one material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMesh {
    pub index_count: u32,
    pub index_offset: u32,
    pub material_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshShape {
    pub name: String,
    pub index_type: IndexType,
    /// One entry per vertex buffer of the matching mesh-buffer shape.
    pub streams: Vec<VertexStream>,
    pub sub_meshes: Vec<SubMesh>,
}

/// `.trmsh`: mesh shape declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshDescriptor {
    pub shapes: Vec<MeshShape>,
    /// Mesh-buffer file holding the shapes' data, relative to this file.
    pub buffer_name: String,
}

/// Index and vertex data of one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshBuffer {
    pub index_buffers: Vec<Vec<u8>>,
    pub vertex_buffers: Vec<Vec<u8>>,
}

/// `.trmbf`: raw buffers, one entry per shape of the mesh descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshBufferDescriptor {
    pub buffers: Vec<MeshBuffer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef {
    /// Shader slot name (`BaseColorMap`, `NormalMap`, ...).
    pub name: String,
    /// Texture file, relative to the material's directory.
    pub file: String,
    pub slot: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SamplerDesc {
    pub repeat_u: u32,
    pub repeat_v: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub name: String,
    pub shaders: Vec<String>,
    pub textures: Vec<TextureRef>,
    pub samplers: Vec<SamplerDesc>,
}

/// `.trmtr`: materials of one model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDescriptor {
    pub materials: Vec<MaterialEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformNode {
    pub name: String,
    pub scale: [f32; 3],
    /// Euler angles in radians.
    pub rotation: [f32; 3],
    pub translation: [f32; 3],
    pub scale_pivot: [f32; 3],
    pub rotate_pivot: [f32; 3],
    /// `-1` for roots.
    pub parent: i32,
    /// Skinning joint index, `-1` if the node is not a joint.
    pub joint_index: i32,
}

/// `.trskl`: the skeleton.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonDescriptor {
    pub nodes: Vec<TransformNode>,
}

/// Keys of one bone. One key per channel means a constant value, otherwise
/// there is one key per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneTrackDesc {
    pub bone_name: String,
    pub scale: Vec<[f32; 3]>,
    pub rotation: Vec<[f32; 3]>,
    pub translation: Vec<[f32; 3]>,
}

/// `.tranm`: a skeletal animation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationDescriptor {
    pub looping: bool,
    pub frame_count: u32,
    pub fps: u32,
    pub tracks: Vec<BoneTrackDesc>,
}

// ============================================================================
// Reader
// ============================================================================

/// Deserializes descriptor bytes into typed descriptors.
pub trait DescriptorReader: Send + Sync {
    fn read_model(&self, data: &[u8]) -> Result<ModelDescriptor>;
    fn read_mesh(&self, data: &[u8]) -> Result<MeshDescriptor>;
    fn read_mesh_buffer(&self, data: &[u8]) -> Result<MeshBufferDescriptor>;
    fn read_material(&self, data: &[u8]) -> Result<MaterialDescriptor>;
    fn read_skeleton(&self, data: &[u8]) -> Result<SkeletonDescriptor>;
    fn read_animation(&self, data: &[u8]) -> Result<AnimationDescriptor>;
}

/// [`DescriptorReader`] for the flatbuffer encoding used on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatbufferDescriptorReader;

/// Run `parse` on the root table, tagging any failure with `kind`.
fn parse_root<T>(
    kind: DescriptorKind,
    data: &[u8],
    parse: impl FnOnce(Table<'_>) -> Result<T>,
) -> Result<T> {
    Table::root(data)
        .and_then(parse)
        .map_err(|e| match e {
            Error::InvalidDescriptor { message, .. } => Error::InvalidDescriptor {
                kind: kind.as_str(),
                message,
            },
            other => Error::InvalidDescriptor {
                kind: kind.as_str(),
                message: other.to_string(),
            },
        })
}

fn file_ref(table: &Table<'_>) -> Result<String> {
    table.string_or_empty(0)
}

fn vec3(table: &Table<'_>, slot: usize, default: [f32; 3]) -> Result<[f32; 3]> {
    Ok(table.f32_struct::<3>(slot)?.unwrap_or(default))
}

fn read_stream(table: &Table<'_>) -> Result<VertexStream> {
    let attributes = table
        .tables(0)?
        .iter()
        .map(|attribute| {
            Ok(VertexAttributeDesc {
                semantic: AttributeSemantic::from_u32(attribute.u32(1, 0)?),
                layer: attribute.u32(2, 0)?,
                format: VertexFormat::from_u32(attribute.u32(3, 0)?)?,
                offset: attribute.u32(4, 0)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let stride = match table.tables(1)?.first() {
        Some(size) => size.u32(0, 0)?,
        None => 0,
    };
    Ok(VertexStream { attributes, stride })
}

fn read_shape(table: &Table<'_>) -> Result<MeshShape> {
    let streams = table
        .tables(3)?
        .iter()
        .map(read_stream)
        .collect::<Result<_>>()?;
    let sub_meshes = table
        .tables(4)?
        .iter()
        .map(|sub| {
            Ok(SubMesh {
                index_count: sub.u32(0, 0)?,
                index_offset: sub.u32(1, 0)?,
                material_name: sub.string_or_empty(3)?,
            })
        })
        .collect::<Result<_>>()?;
    Ok(MeshShape {
        name: table.string_or_empty(0)?,
        index_type: IndexType::from_u32(table.u32(2, 1)?),
        streams,
        sub_meshes,
    })
}

fn byte_buffers(table: &Table<'_>, slot: usize) -> Result<Vec<Vec<u8>>> {
    table
        .tables(slot)?
        .iter()
        .map(|buffer| Ok(buffer.vector(0)?.bytes()?.to_vec()))
        .collect()
}

fn read_node(table: &Table<'_>) -> Result<TransformNode> {
    let (scale, rotation, translation) = match table.table(1)? {
        Some(transform) => (
            vec3(&transform, 0, [1.0; 3])?,
            vec3(&transform, 1, [0.0; 3])?,
            vec3(&transform, 2, [0.0; 3])?,
        ),
        None => ([1.0; 3], [0.0; 3], [0.0; 3]),
    };
    Ok(TransformNode {
        name: table.string_or_empty(0)?,
        scale,
        rotation,
        translation,
        scale_pivot: vec3(table, 2, [0.0; 3])?,
        rotate_pivot: vec3(table, 3, [0.0; 3])?,
        parent: table.i32(4, -1)?,
        joint_index: table.i32(5, -1)?,
    })
}

fn read_track(table: &Table<'_>) -> Result<BoneTrackDesc> {
    Ok(BoneTrackDesc {
        bone_name: table.string_or_empty(0)?,
        scale: table.vector(1)?.f32_structs::<3>()?,
        rotation: table.vector(2)?.f32_structs::<3>()?,
        translation: table.vector(3)?.f32_structs::<3>()?,
    })
}

impl DescriptorReader for FlatbufferDescriptorReader {
    fn read_model(&self, data: &[u8]) -> Result<ModelDescriptor> {
        parse_root(DescriptorKind::Model, data, |root| {
            Ok(ModelDescriptor {
                meshes: root
                    .tables(1)?
                    .iter()
                    .map(file_ref)
                    .collect::<Result<_>>()?,
                skeleton: match root.table(2)? {
                    Some(skeleton) => Some(file_ref(&skeleton)?).filter(|s| !s.is_empty()),
                    None => None,
                },
                materials: root.strings(3)?,
            })
        })
    }

    fn read_mesh(&self, data: &[u8]) -> Result<MeshDescriptor> {
        parse_root(DescriptorKind::Mesh, data, |root| {
            Ok(MeshDescriptor {
                shapes: root
                    .tables(1)?
                    .iter()
                    .map(read_shape)
                    .collect::<Result<_>>()?,
                buffer_name: root.string_or_empty(2)?,
            })
        })
    }

    fn read_mesh_buffer(&self, data: &[u8]) -> Result<MeshBufferDescriptor> {
        parse_root(DescriptorKind::MeshBuffer, data, |root| {
            let buffers = root
                .tables(1)?
                .iter()
                .map(|buffer| {
                    Ok(MeshBuffer {
                        index_buffers: byte_buffers(buffer, 0)?,
                        vertex_buffers: byte_buffers(buffer, 1)?,
                    })
                })
                .collect::<Result<_>>()?;
            Ok(MeshBufferDescriptor { buffers })
        })
    }

    fn read_material(&self, data: &[u8]) -> Result<MaterialDescriptor> {
        parse_root(DescriptorKind::Material, data, |root| {
            let materials = root
                .tables(1)?
                .iter()
                .map(|material| {
                    let textures = material
                        .tables(2)?
                        .iter()
                        .map(|texture| {
                            Ok(TextureRef {
                                name: texture.string_or_empty(0)?,
                                file: texture.string_or_empty(1)?,
                                slot: texture.u32(2, 0)?,
                            })
                        })
                        .collect::<Result<_>>()?;
                    let samplers = material
                        .tables(3)?
                        .iter()
                        .map(|sampler| {
                            Ok(SamplerDesc {
                                repeat_u: sampler.u32(0, 0)?,
                                repeat_v: sampler.u32(1, 0)?,
                            })
                        })
                        .collect::<Result<_>>()?;
                    Ok(MaterialEntry {
                        name: material.string_or_empty(0)?,
                        shaders: material.strings(1)?,
                        textures,
                        samplers,
                    })
                })
                .collect::<Result<_>>()?;
            Ok(MaterialDescriptor { materials })
        })
    }

    fn read_skeleton(&self, data: &[u8]) -> Result<SkeletonDescriptor> {
        parse_root(DescriptorKind::Skeleton, data, |root| {
            Ok(SkeletonDescriptor {
                nodes: root
                    .tables(1)?
                    .iter()
                    .map(read_node)
                    .collect::<Result<_>>()?,
            })
        })
    }

    fn read_animation(&self, data: &[u8]) -> Result<AnimationDescriptor> {
        parse_root(DescriptorKind::Animation, data, |root| {
            let (looping, frame_count, fps) = match root.table(0)? {
                Some(info) => (info.bool(0)?, info.u32(1, 0)?, info.u32(2, 30)?),
                None => (false, 0, 30),
            };
            let tracks = match root.table(1)? {
                Some(skeleton) => skeleton
                    .tables(0)?
                    .iter()
                    .map(read_track)
                    .collect::<Result<_>>()?,
                None => Vec::new(),
            };
            Ok(AnimationDescriptor {
                looping,
                frame_count,
                fps,
                tracks,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::formats::trinity::flatbuffer::builder::{TableValue, finish};

    fn file(name: &str) -> TableValue {
        TableValue::new().string(0, name)
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            DescriptorKind::from_path("pokemon/pm0025/pm0025_00.TRMDL"),
            Some(DescriptorKind::Model)
        );
        assert_eq!(DescriptorKind::from_path("a/b.bntx"), Some(DescriptorKind::Texture));
        assert_eq!(DescriptorKind::from_path("a/b.txt"), None);
        assert_eq!(DescriptorKind::from_path("noext"), None);
    }

    #[test]
    fn test_read_model() {
        let data = finish(
            &TableValue::new()
                .tables(1, vec![file("body.trmsh"), file("eyes.trmsh")])
                .table(2, file("pm0025.trskl"))
                .strings(3, &["pm0025.trmtr"]),
        );
        let model = FlatbufferDescriptorReader.read_model(&data).unwrap();
        assert_eq!(
            model,
            ModelDescriptor {
                meshes: vec!["body.trmsh".into(), "eyes.trmsh".into()],
                skeleton: Some("pm0025.trskl".into()),
                materials: vec!["pm0025.trmtr".into()],
            }
        );
    }

    #[test]
    fn test_read_mesh() {
        let attribute = |semantic: u32, format: u32, offset: u32| {
            TableValue::new()
                .u32(1, semantic)
                .u32(2, 0)
                .u32(3, format)
                .u32(4, offset)
        };
        let stream = TableValue::new()
            .tables(0, vec![attribute(1, 51, 0), attribute(6, 48, 12)])
            .tables(1, vec![TableValue::new().u32(0, 20)]);
        let shape = TableValue::new()
            .string(0, "body")
            .u32(2, 2)
            .tables(3, vec![stream])
            .tables(
                4,
                vec![TableValue::new().u32(0, 3).u32(1, 0).string(3, "skin")],
            );
        let data = finish(&TableValue::new().tables(1, vec![shape]).string(2, "pm.trmbf"));

        let mesh = FlatbufferDescriptorReader.read_mesh(&data).unwrap();
        assert_eq!(mesh.buffer_name, "pm.trmbf");
        let shape = &mesh.shapes[0];
        assert_eq!(shape.index_type, IndexType::U32);
        assert_eq!(shape.streams[0].stride, 20);
        assert_eq!(shape.streams[0].attributes[1].semantic, AttributeSemantic::TexCoord);
        assert_eq!(shape.streams[0].attributes[1].format, VertexFormat::Rg32Float);
        assert_eq!(shape.sub_meshes[0].material_name, "skin");
    }

    #[test]
    fn test_unsupported_vertex_type_is_invalid_mesh() {
        let stream = TableValue::new().tables(0, vec![TableValue::new().u32(1, 1).u32(3, 99)]);
        let shape = TableValue::new().tables(3, vec![stream]);
        let data = finish(&TableValue::new().tables(1, vec![shape]));

        let err = FlatbufferDescriptorReader.read_mesh(&data).unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor { kind: "trmsh", .. }));
    }

    #[test]
    fn test_read_material_and_skeleton() {
        let material = TableValue::new()
            .string(0, "skin")
            .strings(1, &["Standard"])
            .tables(
                2,
                vec![TableValue::new()
                    .string(0, "BaseColorMap")
                    .string(1, "pm0025_body_col.bntx")
                    .u32(2, 0)],
            )
            .tables(3, vec![TableValue::new().u32(0, 2).u32(1, 0)]);
        let data = finish(&TableValue::new().tables(1, vec![material]));
        let materials = FlatbufferDescriptorReader.read_material(&data).unwrap();
        assert_eq!(materials.materials[0].textures[0].file, "pm0025_body_col.bntx");
        assert_eq!(materials.materials[0].samplers[0].repeat_u, 2);

        let transform = TableValue::new()
            .f32s(0, &[1.0, 2.0, 1.0])
            .f32s(2, &[0.0, 5.0, 0.0]);
        let node = TableValue::new()
            .string(0, "spine")
            .table(1, transform)
            .i32(4, 0);
        let data = finish(&TableValue::new().tables(1, vec![file("root"), node]));
        let skeleton = FlatbufferDescriptorReader.read_skeleton(&data).unwrap();
        assert_eq!(skeleton.nodes[0].parent, -1);
        assert_eq!(skeleton.nodes[0].scale, [1.0; 3]);
        assert_eq!(skeleton.nodes[1].scale, [1.0, 2.0, 1.0]);
        assert_eq!(skeleton.nodes[1].translation, [0.0, 5.0, 0.0]);
        assert_eq!(skeleton.nodes[1].parent, 0);
    }

    #[test]
    fn test_read_animation() {
        let track = TableValue::new()
            .string(0, "spine")
            .vec3s(1, &[[1.0; 3]])
            .vec3s(3, &[[0.0; 3], [0.0, 1.0, 0.0]]);
        let data = finish(
            &TableValue::new()
                .table(0, TableValue::new().u8(0, 1).u32(1, 2).u32(2, 60))
                .table(1, TableValue::new().tables(0, vec![track])),
        );
        let animation = FlatbufferDescriptorReader.read_animation(&data).unwrap();
        assert!(animation.looping);
        assert_eq!((animation.frame_count, animation.fps), (2, 60));
        assert_eq!(animation.tracks[0].scale.len(), 1);
        assert!(animation.tracks[0].rotation.is_empty());
        assert_eq!(animation.tracks[0].translation[1], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_garbage_is_invalid_descriptor() {
        let err = FlatbufferDescriptorReader
            .read_material(&[0xFF; 3])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor { kind: "trmtr", .. }));
    }

    #[test]
    fn test_vertex_formats() {
        let bytes = [255u8, 0, 128, 255];
        let v = VertexFormat::Rgba8Unorm.read(&bytes, 0).unwrap();
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 0.0);

        let halves: Vec<u8> = [1.0f32, 0.5, -2.0, 0.0]
            .iter()
            .flat_map(|v| f16::from_f32(*v).to_bits().to_le_bytes())
            .collect();
        let v = VertexFormat::Rgba16Float.read(&halves, 0).unwrap();
        assert_eq!(v, Vec4::new(1.0, 0.5, -2.0, 0.0));

        assert!(VertexFormat::Rgb32Float.read(&[0; 8], 0).is_err());
    }
}
