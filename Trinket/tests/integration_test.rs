use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use trinket::export::Manifest;
use trinket::formats::bntx;
use trinket::formats::trinity::descriptors::{
    AttributeSemantic, IndexType, MaterialDescriptor, MaterialEntry, MeshBuffer,
    MeshBufferDescriptor, MeshDescriptor, MeshShape, ModelDescriptor, SkeletonDescriptor,
    SubMesh, TextureRef, TransformNode, VertexAttributeDesc, VertexFormat, VertexStream,
};
use trinket::formats::trinity::{AnimationDescriptor, DescriptorReader};
use trinket::prelude::*;

// ============================================================================
// Fixtures
// ============================================================================

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// A BCH container (backward compatibility 0x20) with empty content tables
/// and one relocation record: flag 1 at main-header byte 8, the name offset
/// of the models table, which holds the string-relative offset 4.
fn bch_with_string_relocation() -> Vec<u8> {
    let mut data = vec![0u8; 0x200];
    data[..4].copy_from_slice(b"BCH\0");
    data[4] = 0x20;
    data[6..8].copy_from_slice(&0x5u16.to_le_bytes());

    // offsets: main header, string table, gpu commands, data, relocation
    for (i, offset) in [0x40u32, 0x100, 0x180, 0x1C0, 0x1F0].iter().enumerate() {
        put_u32(&mut data, 8 + i * 4, *offset);
    }
    // lengths: main header, strings, gpu, data, relocation, uninit data/desc
    for (i, length) in [0xB4u32, 0x40, 0x40, 0x30, 4, 0, 0].iter().enumerate() {
        put_u32(&mut data, 28 + i * 4, *length);
    }

    put_u32(&mut data, 0x48, 4);
    put_u32(&mut data, 0x1F0, (1 << 25) | 8);
    data
}

/// A BNTX file with one pitch-linear RGBA8 texture.
fn bntx_rgba(name: &str, width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 0x100];
    data[..4].copy_from_slice(b"BNTX");
    data[0x10..0x12].copy_from_slice(&1u16.to_le_bytes());
    data[0x14..0x18].copy_from_slice(b"NX  ");
    put_u32(&mut data, 0x18, 0x20);

    data[0x20..0x24].copy_from_slice(b"_DIC");
    put_u32(&mut data, 0x28, 1);
    put_u32(&mut data, 0x2C, 0x40);

    data[0x40..0x44].copy_from_slice(b"BRTI");
    let fields = [0x80u32, 1, width, height, 1, 1, 1, 0x0B01, 0, 0x100, 0x80];
    for (i, value) in fields.iter().enumerate() {
        put_u32(&mut data, 0x44 + i * 4, *value);
    }
    data[0x80..0x82].copy_from_slice(&(name.len() as u16).to_le_bytes());
    data[0x82..0x82 + name.len()].copy_from_slice(name.as_bytes());

    data.extend_from_slice(pixels);
    data
}

/// Descriptors stored as JSON.
struct JsonReader;

fn parse<T: serde::de::DeserializeOwned>(kind: &'static str, data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|err| Error::InvalidDescriptor {
        kind,
        message: err.to_string(),
    })
}

impl DescriptorReader for JsonReader {
    fn read_model(&self, data: &[u8]) -> Result<ModelDescriptor> {
        parse("trmdl", data)
    }
    fn read_mesh(&self, data: &[u8]) -> Result<MeshDescriptor> {
        parse("trmsh", data)
    }
    fn read_mesh_buffer(&self, data: &[u8]) -> Result<MeshBufferDescriptor> {
        parse("trmbf", data)
    }
    fn read_material(&self, data: &[u8]) -> Result<MaterialDescriptor> {
        parse("trmtr", data)
    }
    fn read_skeleton(&self, data: &[u8]) -> Result<SkeletonDescriptor> {
        parse("trskl", data)
    }
    fn read_animation(&self, data: &[u8]) -> Result<AnimationDescriptor> {
        parse("tranm", data)
    }
}

fn json<T: serde::Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

/// Files of a one-triangle model under `dir`, with a base-colour texture and
/// a single-bone skeleton but no animations.
fn triangle_model(archive: &mut MemoryArchive, dir: &str, name: &str) {
    let positions: Vec<u8> = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        .iter()
        .flatten()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let indices: Vec<u8> = [0u16, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect();

    let model = ModelDescriptor {
        meshes: vec![format!("{name}.trmsh")],
        skeleton: Some(format!("{name}.trskl")),
        materials: vec![format!("{name}.trmtr")],
    };
    let mesh = MeshDescriptor {
        shapes: vec![MeshShape {
            name: "body".to_string(),
            index_type: IndexType::U16,
            streams: vec![VertexStream {
                attributes: vec![VertexAttributeDesc {
                    semantic: AttributeSemantic::Position,
                    layer: 0,
                    format: VertexFormat::Rgb32Float,
                    offset: 0,
                }],
                stride: 12,
            }],
            sub_meshes: vec![SubMesh {
                index_count: 3,
                index_offset: 0,
                material_name: "body".to_string(),
            }],
        }],
        buffer_name: format!("{name}.trmbf"),
    };
    let buffers = MeshBufferDescriptor {
        buffers: vec![MeshBuffer {
            index_buffers: vec![indices],
            vertex_buffers: vec![positions],
        }],
    };
    let material = MaterialDescriptor {
        materials: vec![MaterialEntry {
            name: "body".to_string(),
            textures: vec![TextureRef {
                name: "BaseColorMap".to_string(),
                file: format!("../tex/{name}_col.bntx"),
                slot: 0,
            }],
            ..MaterialEntry::default()
        }],
    };
    let skeleton = SkeletonDescriptor {
        nodes: vec![TransformNode {
            name: "root".to_string(),
            scale: [1.0; 3],
            rotation: [0.0; 3],
            translation: [0.0; 3],
            scale_pivot: [0.0; 3],
            rotate_pivot: [0.0; 3],
            parent: -1,
            joint_index: 0,
        }],
    };

    let white = [255u8; 16];
    archive.insert(&format!("{dir}/mdl/{name}.trmdl"), json(&model));
    archive.insert(&format!("{dir}/mdl/{name}.trmsh"), json(&mesh));
    archive.insert(&format!("{dir}/mdl/{name}.trmbf"), json(&buffers));
    archive.insert(&format!("{dir}/mdl/{name}.trmtr"), json(&material));
    archive.insert(&format!("{dir}/mdl/{name}.trskl"), json(&skeleton));
    archive.insert(
        &format!("{dir}/tex/{name}_col.bntx"),
        bntx_rgba(name, 2, 2, &white),
    );
}

// ============================================================================
// BCH
// ============================================================================

#[test]
fn test_bch_string_table_relocation() {
    let source = bch_with_string_relocation();
    let container = BchContainer::load(&source).unwrap();

    assert_eq!(container.header().backward_compatibility, 0x20);
    assert!(!container.header().has_extended_data());
    assert_eq!(container.content().models.name_offset, 4 + 0x100);
    // the caller's bytes are never patched
    assert_eq!(&source[0x48..0x4C], &4u32.to_le_bytes());

    // relocation runs once per load
    let again = BchContainer::load(&source).unwrap();
    assert_eq!(again.data(), container.data());
}

#[test]
fn test_bch_without_models_decodes_to_empty_scene() {
    let container = BchContainer::load(&bch_with_string_relocation()).unwrap();
    let scene = container.decode();
    assert!(scene.models.is_empty());
    assert!(scene.textures.is_empty());
    assert!(scene.warnings.is_empty());
}

#[test]
fn test_bch_oversized_model_count_is_a_warning() {
    let mut data = bch_with_string_relocation();
    put_u32(&mut data, 0x44, u32::MAX);

    let scene = BchContainer::load(&data).unwrap().decode();
    assert!(scene.models.is_empty());
    assert_eq!(scene.warnings.len(), 1);
    assert!(scene.warnings[0].contains("models table"));
}

#[test]
fn test_bch_rejects_other_files() {
    let err = BchContainer::load(b"BNTX\0\0\0\0").unwrap_err();
    assert!(matches!(err, Error::InvalidBchMagic(magic) if &magic == b"BNTX"));
}

// ============================================================================
// BNTX
// ============================================================================

#[test]
fn test_bntx_dictionary_mismatch_yields_warning() {
    let mut data = bntx_rgba("a", 1, 1, &[1, 2, 3, 4]);
    data[0x20..0x24].copy_from_slice(b"XXXX");

    let result = bntx::decode(&data, &TextureCodec::new()).unwrap();
    assert!(result.textures.is_empty());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_bntx_to_png() {
    let pixels: Vec<u8> = (0..16).collect();
    let result = bntx::decode(&bntx_rgba("tex", 2, 2, &pixels), &TextureCodec::new()).unwrap();

    let texture = &result.textures[0];
    assert_eq!(texture.name, "tex");
    assert_eq!(texture.rgba, pixels);

    let png = trinket::export::rgba_to_png_bytes(&texture.rgba, 2, 2).unwrap();
    assert_eq!(&png[1..4], b"PNG");
}

struct BrokenDecoder;

impl Bc6hDecoder for BrokenDecoder {
    fn decode(&self, _data: &[u8], _width: u32, _height: u32, _signed: bool) -> Result<Vec<u8>> {
        Err(Error::Bc6hDecodeFailed {
            message: "unsupported mode".to_string(),
        })
    }
}

#[test]
fn test_bc6h_decoder_failure_is_red() {
    let codec = TextureCodec::new().with_bc6h_decoder(Arc::new(BrokenDecoder));
    let format = bntx::PixelFormat::Bc6h { signed: false };

    let decoded = codec.decode(format, &[0; 16], 4, 4);
    assert_eq!(&decoded.rgba[..4], &[255, 0, 0, 255]);
    assert!(decoded.warning.is_some());

    let unregistered = TextureCodec::new().decode(format, &[0; 16], 4, 4);
    assert_eq!(&unregistered.rgba[..4], &[255, 0, 255, 255]);
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_trinity_model() {
    let mut archive = MemoryArchive::new();
    triangle_model(&mut archive, "pokemon/pm0004", "pm0004");
    let out = tempdir().unwrap();

    let orchestrator = ExportOrchestrator::new(&archive, &JsonReader);
    let result = orchestrator
        .export_model("pokemon/pm0004/mdl/pm0004.trmdl", out.path(), &|_| {})
        .unwrap();

    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    let dae = std::fs::read_to_string(out.path().join("model.dae")).unwrap();
    assert!(dae.contains("<init_from>textures/pm0004_col.png</init_from>"));
    // no blend indices, so the mesh is not skinned
    assert!(dae.contains(r##"<instance_geometry url="#geometry0">"##));
    assert!(out.path().join("textures/pm0004_col.png").exists());

    let manifest = Manifest::read(&out.path().join("manifest.json")).unwrap();
    assert_eq!(manifest.source, "pokemon/pm0004/mdl/pm0004.trmdl");
    assert_eq!(manifest.textures, vec!["textures/pm0004_col.png".to_string()]);
    assert!(manifest.animations.is_empty());
}

#[test]
fn test_batch_export_continues_after_failure() {
    let mut archive = MemoryArchive::new();
    triangle_model(&mut archive, "pokemon/pm0001", "pm0001");
    triangle_model(&mut archive, "pokemon/pm0002", "pm0002");
    triangle_model(&mut archive, "pokemon/pm0003", "pm0003");
    archive.insert("pokemon/pm0002/mdl/pm0002.trmdl", b"\x00\x01broken".to_vec());

    let out = tempdir().unwrap();
    let orchestrator = ExportOrchestrator::new(&archive, &JsonReader);
    let result = orchestrator.export_all(out.path(), &|_| {});

    assert_eq!((result.succeeded, result.failed, result.total), (2, 1, 3));
    assert_eq!(result.failures[0].0, "pokemon/pm0002/mdl/pm0002.trmdl");
    assert!(out.path().join("pm0001/model.dae").exists());
    assert!(out.path().join("pm0003/model.dae").exists());
    assert!(!out.path().join("pm0002/model.dae").exists());
}

#[test]
fn test_directory_archive_lists_models() {
    let root = tempdir().unwrap();
    let mdl = root.path().join("pokemon").join("pm0001").join("mdl");
    std::fs::create_dir_all(&mdl).unwrap();
    std::fs::write(mdl.join("pm0001.trmdl"), b"{}").unwrap();
    std::fs::write(mdl.join("pm0001.trmsh"), b"{}").unwrap();

    let archive = DirectoryArchive::open(root.path()).unwrap();
    let orchestrator = ExportOrchestrator::new(&archive, &JsonReader);
    assert_eq!(
        orchestrator.list_models(),
        vec!["pokemon/pm0001/mdl/pm0001.trmdl".to_string()]
    );
}

#[test]
fn test_export_options_from_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trinket.toml");
    std::fs::write(&path, "export_animations = false\ntexture_dir = \"tex\"\n").unwrap();

    let options = ExportOptions::from_toml_file(Path::new(&path)).unwrap();
    assert!(!options.export_animations);
    assert_eq!(options.texture_dir, "tex");
    assert_eq!(options.model_file_stem, "model");
}
