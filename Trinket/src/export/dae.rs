//! COLLADA 1.4.1 writing.
//!
//! A model document holds images, effects, materials, one geometry per
//! mesh, one skin controller per skinned mesh and a visual scene with the
//! joint hierarchy. An animation document holds the same images and
//! materials, the joint hierarchy and a single clip sampled as one matrix
//! per frame and animated bone.

use std::fs;
use std::path::Path;

use glam::Mat4;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use crate::error::Result;
use crate::scene::{
    AnimationClip, SceneModel, bone_local_transform, local_transform, world_transforms,
};

const COLLADA_NAMESPACE: &str = "http://www.collada.org/2005/11/COLLADASchema";
const FALLBACK_FPS: f32 = 30.0;

/// Writes scene models and animation clips to an interchange format.
pub trait SceneExporter {
    /// File extension of the documents written, without the dot.
    fn extension(&self) -> &'static str;

    /// Write `model` to `path`. Image paths are written relative to the
    /// document as `<texture_dir>/<texture>.png`.
    fn export_model(&self, model: &SceneModel, texture_dir: &str, path: &Path) -> Result<()>;

    /// Write `clip`, bound to the skeleton of `model`, to `path`.
    fn export_animation(
        &self,
        model: &SceneModel,
        clip: &AnimationClip,
        texture_dir: &str,
        path: &Path,
    ) -> Result<()>;
}

/// [`SceneExporter`] writing COLLADA (`.dae`) documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DaeExporter;

impl SceneExporter for DaeExporter {
    fn extension(&self) -> &'static str {
        "dae"
    }

    fn export_model(&self, model: &SceneModel, texture_dir: &str, path: &Path) -> Result<()> {
        fs::write(path, model_document(model, texture_dir)?)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn export_animation(
        &self,
        model: &SceneModel,
        clip: &AnimationClip,
        texture_dir: &str,
        path: &Path,
    ) -> Result<()> {
        fs::write(path, animation_document(model, clip, texture_dir)?)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

// ============================================================================
// XML helpers
// ============================================================================

struct DaeWriter {
    writer: Writer<Vec<u8>>,
}

impl DaeWriter {
    fn new() -> Result<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(Self { writer })
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn leaf(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> Result<()> {
        self.open(name, attributes)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> String {
        String::from_utf8_lossy(&self.writer.into_inner()).into_owned()
    }

    /// `<source>` holding a float array read with `stride` named params.
    fn float_source(
        &mut self,
        id: &str,
        values: &[f32],
        params: &[&str],
        param_type: &str,
        stride: usize,
    ) -> Result<()> {
        let array_id = format!("{id}-array");
        let count = (values.len() / stride.max(1)).to_string();
        self.open("source", &[("id", id)])?;
        self.leaf(
            "float_array",
            &[("id", &array_id), ("count", &values.len().to_string())],
            &floats(values.iter().copied()),
        )?;
        self.accessor(&array_id, &count, stride, params, param_type)?;
        self.close("source")
    }

    fn name_source(&mut self, id: &str, names: &[String], param: &str) -> Result<()> {
        let array_id = format!("{id}-array");
        self.open("source", &[("id", id)])?;
        self.leaf(
            "Name_array",
            &[("id", &array_id), ("count", &names.len().to_string())],
            &names.join(" "),
        )?;
        self.accessor(&array_id, &names.len().to_string(), 1, &[param], "name")?;
        self.close("source")
    }

    fn accessor(
        &mut self,
        array_id: &str,
        count: &str,
        stride: usize,
        params: &[&str],
        param_type: &str,
    ) -> Result<()> {
        self.open("technique_common", &[])?;
        self.open(
            "accessor",
            &[
                ("source", &format!("#{array_id}")),
                ("count", count),
                ("stride", &stride.to_string()),
            ],
        )?;
        for param in params {
            self.empty("param", &[("name", *param), ("type", param_type)])?;
        }
        self.close("accessor")?;
        self.close("technique_common")
    }
}

fn floats(values: impl IntoIterator<Item = f32>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Row-major text of a matrix, as COLLADA expects.
fn matrix_text(matrix: &Mat4) -> String {
    floats(matrix.transpose().to_cols_array())
}

/// Make `name` usable as an XML id / sid.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn bone_id(index: usize) -> String {
    format!("bone{index}")
}

fn material_id(index: usize) -> String {
    format!("material{index}")
}

// ============================================================================
// Shared sections
// ============================================================================

fn write_header(dae: &mut DaeWriter) -> Result<()> {
    dae.open("COLLADA", &[("xmlns", COLLADA_NAMESPACE), ("version", "1.4.1")])?;
    dae.open("asset", &[])?;
    dae.open("contributor", &[])?;
    dae.leaf("authoring_tool", &[], concat!("trinket ", env!("CARGO_PKG_VERSION")))?;
    dae.close("contributor")?;
    dae.leaf("created", &[], "1970-01-01T00:00:00Z")?;
    dae.leaf("modified", &[], "1970-01-01T00:00:00Z")?;
    dae.empty("unit", &[("name", "meter"), ("meter", "1")])?;
    dae.leaf("up_axis", &[], "Y_UP")?;
    dae.close("asset")
}

/// Distinct non-empty texture names of every material, in first-use order.
fn texture_names(model: &SceneModel) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for material in &model.materials {
        for texture in &material.textures {
            if !texture.is_empty() && !names.contains(&texture.as_str()) {
                names.push(texture);
            }
        }
    }
    names
}

fn write_images(dae: &mut DaeWriter, model: &SceneModel, texture_dir: &str) -> Result<()> {
    let names = texture_names(model);
    if names.is_empty() {
        return Ok(());
    }
    dae.open("library_images", &[])?;
    for name in names {
        let id = format!("image_{}", sanitize(name));
        dae.open("image", &[("id", &id), ("name", name)])?;
        dae.leaf("init_from", &[], &format!("{texture_dir}/{name}.png"))?;
        dae.close("image")?;
    }
    dae.close("library_images")
}

fn write_materials(dae: &mut DaeWriter, model: &SceneModel) -> Result<()> {
    if model.materials.is_empty() {
        return Ok(());
    }

    dae.open("library_effects", &[])?;
    for (index, material) in model.materials.iter().enumerate() {
        dae.open("effect", &[("id", &format!("effect{index}"))])?;
        dae.open("profile_COMMON", &[])?;

        let diffuse = material.diffuse_texture();
        if let Some(texture) = diffuse {
            let mapper = &material.mappers[0];
            dae.open("newparam", &[("sid", "surface")])?;
            dae.open("surface", &[("type", "2D")])?;
            dae.leaf("init_from", &[], &format!("image_{}", sanitize(texture)))?;
            dae.close("surface")?;
            dae.close("newparam")?;
            dae.open("newparam", &[("sid", "sampler")])?;
            dae.open("sampler2D", &[])?;
            dae.leaf("source", &[], "surface")?;
            dae.leaf("wrap_s", &[], mapper.wrap_u.as_collada())?;
            dae.leaf("wrap_t", &[], mapper.wrap_v.as_collada())?;
            dae.close("sampler2D")?;
            dae.close("newparam")?;
        }

        dae.open("technique", &[("sid", "common")])?;
        dae.open("phong", &[])?;
        dae.open("diffuse", &[])?;
        if diffuse.is_some() {
            dae.empty("texture", &[("texture", "sampler"), ("texcoord", "uv0")])?;
        } else {
            dae.leaf("color", &[], "1 1 1 1")?;
        }
        dae.close("diffuse")?;
        dae.close("phong")?;
        dae.close("technique")?;

        dae.close("profile_COMMON")?;
        dae.close("effect")?;
    }
    dae.close("library_effects")?;

    dae.open("library_materials", &[])?;
    for (index, material) in model.materials.iter().enumerate() {
        dae.open(
            "material",
            &[("id", &material_id(index)), ("name", &material.name)],
        )?;
        dae.empty("instance_effect", &[("url", &format!("#effect{index}"))])?;
        dae.close("material")?;
    }
    dae.close("library_materials")
}

/// Joint nodes in hierarchy order, walked with an explicit stack.
fn write_joints(dae: &mut DaeWriter, model: &SceneModel) -> Result<()> {
    let mut children = vec![Vec::new(); model.bones.len()];
    let mut roots = Vec::new();
    for (index, bone) in model.bones.iter().enumerate() {
        match bone.parent() {
            Some(parent) if parent < index => children[parent].push(index),
            _ => roots.push(index),
        }
    }

    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
    while let Some((index, closing)) = stack.pop() {
        if closing {
            dae.close("node")?;
            continue;
        }
        let bone = &model.bones[index];
        dae.open(
            "node",
            &[
                ("id", &bone_id(index)),
                ("sid", &sanitize(&bone.name)),
                ("name", &bone.name),
                ("type", "JOINT"),
            ],
        )?;
        dae.leaf(
            "matrix",
            &[("sid", "transform")],
            &matrix_text(&bone_local_transform(bone)),
        )?;
        stack.push((index, true));
        stack.extend(children[index].iter().rev().map(|&c| (c, false)));
    }
    Ok(())
}

// ============================================================================
// Model document
// ============================================================================

fn is_skinned(model: &SceneModel, mesh_index: usize) -> bool {
    model.has_skeleton() && model.meshes[mesh_index].has_node
}

fn write_geometries(dae: &mut DaeWriter, model: &SceneModel) -> Result<()> {
    dae.open("library_geometries", &[])?;
    for (index, mesh) in model.meshes.iter().enumerate() {
        let id = format!("geometry{index}");
        dae.open("geometry", &[("id", &id), ("name", &mesh.name)])?;
        dae.open("mesh", &[])?;

        let positions: Vec<f32> = mesh
            .vertices
            .iter()
            .flat_map(|v| v.position.to_array())
            .collect();
        dae.float_source(
            &format!("{id}-positions"),
            &positions,
            &["X", "Y", "Z"],
            "float",
            3,
        )?;
        if mesh.has_normal {
            let normals: Vec<f32> = mesh
                .vertices
                .iter()
                .flat_map(|v| v.normal.to_array())
                .collect();
            dae.float_source(&format!("{id}-normals"), &normals, &["X", "Y", "Z"], "float", 3)?;
        }
        for set in 0..mesh.uv_count.min(3) {
            let uvs: Vec<f32> = mesh
                .vertices
                .iter()
                .flat_map(|v| v.uv[set].to_array())
                .collect();
            dae.float_source(&format!("{id}-uv{set}"), &uvs, &["S", "T"], "float", 2)?;
        }
        if mesh.has_color {
            let colors: Vec<f32> = mesh
                .vertices
                .iter()
                .flat_map(|v| v.color_rgba().map(|c| f32::from(c) / 255.0))
                .collect();
            dae.float_source(
                &format!("{id}-colors"),
                &colors,
                &["R", "G", "B", "A"],
                "float",
                4,
            )?;
        }

        let vertices_id = format!("{id}-vertices");
        dae.open("vertices", &[("id", &vertices_id)])?;
        dae.empty(
            "input",
            &[("semantic", "POSITION"), ("source", &format!("#{id}-positions"))],
        )?;
        dae.close("vertices")?;

        let triangle_count = (mesh.vertices.len() / 3).to_string();
        let material = mesh
            .material_id
            .filter(|&id| id < model.materials.len())
            .map(material_id);
        let mut attributes = vec![("count", triangle_count.as_str())];
        if let Some(material) = &material {
            attributes.push(("material", material.as_str()));
        }
        dae.open("triangles", &attributes)?;
        dae.empty(
            "input",
            &[
                ("semantic", "VERTEX"),
                ("source", &format!("#{vertices_id}")),
                ("offset", "0"),
            ],
        )?;
        if mesh.has_normal {
            dae.empty(
                "input",
                &[
                    ("semantic", "NORMAL"),
                    ("source", &format!("#{id}-normals")),
                    ("offset", "0"),
                ],
            )?;
        }
        for set in 0..mesh.uv_count.min(3) {
            dae.empty(
                "input",
                &[
                    ("semantic", "TEXCOORD"),
                    ("source", &format!("#{id}-uv{set}")),
                    ("offset", "0"),
                    ("set", &set.to_string()),
                ],
            )?;
        }
        if mesh.has_color {
            dae.empty(
                "input",
                &[
                    ("semantic", "COLOR"),
                    ("source", &format!("#{id}-colors")),
                    ("offset", "0"),
                ],
            )?;
        }
        let used = mesh.vertices.len() - mesh.vertices.len() % 3;
        let indices: Vec<String> = (0..used).map(|i| i.to_string()).collect();
        dae.leaf("p", &[], &indices.join(" "))?;
        dae.close("triangles")?;

        dae.close("mesh")?;
        dae.close("geometry")?;
    }
    dae.close("library_geometries")
}

fn write_controllers(dae: &mut DaeWriter, model: &SceneModel) -> Result<()> {
    if !(0..model.meshes.len()).any(|i| is_skinned(model, i)) {
        return Ok(());
    }

    let joint_names: Vec<String> = model.bones.iter().map(|b| sanitize(&b.name)).collect();
    let inverse_binds: Vec<f32> = world_transforms(&model.bones)
        .iter()
        .flat_map(|world| world.inverse().transpose().to_cols_array())
        .collect();

    dae.open("library_controllers", &[])?;
    for (index, mesh) in model.meshes.iter().enumerate() {
        if !is_skinned(model, index) {
            continue;
        }
        let id = format!("controller{index}");
        dae.open("controller", &[("id", &id)])?;
        dae.open("skin", &[("source", &format!("#geometry{index}"))])?;
        dae.leaf("bind_shape_matrix", &[], &matrix_text(&Mat4::IDENTITY))?;

        dae.name_source(&format!("{id}-joints"), &joint_names, "JOINT")?;
        dae.float_source(
            &format!("{id}-inverse-binds"),
            &inverse_binds,
            &["TRANSFORM"],
            "float4x4",
            16,
        )?;

        let mut weights = Vec::new();
        let mut counts = Vec::with_capacity(mesh.vertices.len());
        let mut pairs = Vec::new();
        for vertex in &mesh.vertices {
            let mut count = 0;
            for (&bone, &weight) in vertex.bone_indices.iter().zip(&vertex.bone_weights) {
                if bone >= model.bones.len() {
                    continue;
                }
                pairs.push(bone.to_string());
                pairs.push(weights.len().to_string());
                weights.push(weight);
                count += 1;
            }
            counts.push(count.to_string());
        }
        dae.float_source(&format!("{id}-weights"), &weights, &["WEIGHT"], "float", 1)?;

        dae.open("joints", &[])?;
        dae.empty(
            "input",
            &[("semantic", "JOINT"), ("source", &format!("#{id}-joints"))],
        )?;
        dae.empty(
            "input",
            &[
                ("semantic", "INV_BIND_MATRIX"),
                ("source", &format!("#{id}-inverse-binds")),
            ],
        )?;
        dae.close("joints")?;

        dae.open(
            "vertex_weights",
            &[("count", &mesh.vertices.len().to_string())],
        )?;
        dae.empty(
            "input",
            &[
                ("semantic", "JOINT"),
                ("source", &format!("#{id}-joints")),
                ("offset", "0"),
            ],
        )?;
        dae.empty(
            "input",
            &[
                ("semantic", "WEIGHT"),
                ("source", &format!("#{id}-weights")),
                ("offset", "1"),
            ],
        )?;
        dae.leaf("vcount", &[], &counts.join(" "))?;
        dae.leaf("v", &[], &pairs.join(" "))?;
        dae.close("vertex_weights")?;

        dae.close("skin")?;
        dae.close("controller")?;
    }
    dae.close("library_controllers")
}

fn write_bind_material(dae: &mut DaeWriter, model: &SceneModel, material: Option<usize>) -> Result<()> {
    let Some(material) = material.filter(|&id| id < model.materials.len()) else {
        return Ok(());
    };
    let id = material_id(material);
    dae.open("bind_material", &[])?;
    dae.open("technique_common", &[])?;
    dae.open(
        "instance_material",
        &[("symbol", &id), ("target", &format!("#{id}"))],
    )?;
    dae.empty(
        "bind_vertex_input",
        &[
            ("semantic", "uv0"),
            ("input_semantic", "TEXCOORD"),
            ("input_set", "0"),
        ],
    )?;
    dae.close("instance_material")?;
    dae.close("technique_common")?;
    dae.close("bind_material")
}

fn write_visual_scene(dae: &mut DaeWriter, model: &SceneModel, with_meshes: bool) -> Result<()> {
    dae.open("library_visual_scenes", &[])?;
    dae.open(
        "visual_scene",
        &[("id", "scene"), ("name", &model.name)],
    )?;
    write_joints(dae, model)?;

    if with_meshes {
        let skeleton_root = model
            .bones
            .iter()
            .position(|b| b.parent().is_none())
            .map(|root| format!("#{}", bone_id(root)));
        for (index, mesh) in model.meshes.iter().enumerate() {
            dae.open(
                "node",
                &[
                    ("id", &format!("mesh{index}")),
                    ("name", &mesh.name),
                    ("type", "NODE"),
                ],
            )?;
            dae.leaf("matrix", &[("sid", "transform")], &matrix_text(&model.transform))?;
            if is_skinned(model, index) {
                dae.open(
                    "instance_controller",
                    &[("url", &format!("#controller{index}"))],
                )?;
                if let Some(root) = &skeleton_root {
                    dae.leaf("skeleton", &[], root)?;
                }
                write_bind_material(dae, model, mesh.material_id)?;
                dae.close("instance_controller")?;
            } else {
                dae.open(
                    "instance_geometry",
                    &[("url", &format!("#geometry{index}"))],
                )?;
                write_bind_material(dae, model, mesh.material_id)?;
                dae.close("instance_geometry")?;
            }
            dae.close("node")?;
        }
    }

    dae.close("visual_scene")?;
    dae.close("library_visual_scenes")?;
    dae.open("scene", &[])?;
    dae.empty("instance_visual_scene", &[("url", "#scene")])?;
    dae.close("scene")
}

/// Serialize `model` as a COLLADA document.
///
/// # Errors
/// Returns an error if XML serialization fails.
pub fn model_document(model: &SceneModel, texture_dir: &str) -> Result<String> {
    let mut dae = DaeWriter::new()?;
    write_header(&mut dae)?;
    write_images(&mut dae, model, texture_dir)?;
    write_materials(&mut dae, model)?;
    write_geometries(&mut dae, model)?;
    write_controllers(&mut dae, model)?;
    write_visual_scene(&mut dae, model, true)?;
    dae.close("COLLADA")?;
    Ok(dae.finish())
}

// ============================================================================
// Animation document
// ============================================================================

fn write_animations(dae: &mut DaeWriter, model: &SceneModel, clip: &AnimationClip) -> Result<Vec<String>> {
    let frames = clip.frame_count.max(1);
    let fps = if clip.fps > 0.0 { clip.fps } else { FALLBACK_FPS };
    let times: Vec<f32> = (0..frames).map(|f| f as f32 / fps).collect();
    let interpolations = vec!["LINEAR".to_string(); frames];

    let mut animation_ids = Vec::new();
    dae.open("library_animations", &[])?;
    for track in &clip.tracks {
        let Some(index) = model.bones.iter().position(|b| b.name == track.bone_name) else {
            debug!("Clip '{}' animates unknown bone '{}'", clip.name, track.bone_name);
            continue;
        };
        let bone = &model.bones[index];
        let id = format!("animation_{}", bone_id(index));

        let matrices: Vec<f32> = (0..frames)
            .flat_map(|frame| {
                let (scale, rotation, translation) = track.sample(frame, bone);
                local_transform(scale, rotation, translation)
                    .transpose()
                    .to_cols_array()
            })
            .collect();

        dae.open("animation", &[("id", &id)])?;
        dae.float_source(&format!("{id}-input"), &times, &["TIME"], "float", 1)?;
        dae.float_source(
            &format!("{id}-output"),
            &matrices,
            &["TRANSFORM"],
            "float4x4",
            16,
        )?;
        dae.name_source(&format!("{id}-interpolation"), &interpolations, "INTERPOLATION")?;

        let sampler = format!("{id}-sampler");
        dae.open("sampler", &[("id", &sampler)])?;
        for (semantic, suffix) in [
            ("INPUT", "input"),
            ("OUTPUT", "output"),
            ("INTERPOLATION", "interpolation"),
        ] {
            dae.empty(
                "input",
                &[("semantic", semantic), ("source", &format!("#{id}-{suffix}"))],
            )?;
        }
        dae.close("sampler")?;
        dae.empty(
            "channel",
            &[
                ("source", &format!("#{sampler}")),
                ("target", &format!("{}/transform", bone_id(index))),
            ],
        )?;
        dae.close("animation")?;
        animation_ids.push(id);
    }
    dae.close("library_animations")?;
    Ok(animation_ids)
}

/// Serialize `clip` with the skeleton of `model` as a COLLADA document.
///
/// # Errors
/// Returns an error if XML serialization fails.
pub fn animation_document(
    model: &SceneModel,
    clip: &AnimationClip,
    texture_dir: &str,
) -> Result<String> {
    let mut dae = DaeWriter::new()?;
    write_header(&mut dae)?;
    write_images(&mut dae, model, texture_dir)?;
    write_materials(&mut dae, model)?;

    let animation_ids = write_animations(&mut dae, model, clip)?;
    dae.open("library_animation_clips", &[])?;
    dae.open(
        "animation_clip",
        &[
            ("id", &format!("clip_{}", sanitize(&clip.name))),
            ("name", &clip.name),
            ("start", "0"),
            ("end", &clip.duration().to_string()),
        ],
    )?;
    for id in &animation_ids {
        dae.empty("instance_animation", &[("url", &format!("#{id}"))])?;
    }
    dae.close("animation_clip")?;
    dae.close("library_animation_clips")?;

    write_visual_scene(&mut dae, model, false)?;
    dae.close("COLLADA")?;
    Ok(dae.finish())
}
