//! Renderer-agnostic scene types shared by the BCH and Trinity decoders.

use glam::{Mat4, Vec2, Vec3};

/// Vertex colour used when a mesh carries no colour stream (opaque white).
pub const DEFAULT_VERTEX_COLOR: u32 = 0xFFFF_FFFF;

/// How a mesh's vertices are bound to bones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkinningMode {
    /// No skinning information.
    #[default]
    None,
    /// Up to four weighted influences per vertex.
    Smooth,
    /// One bone per vertex, baked into the vertex position.
    Rigid,
}

impl SkinningMode {
    #[must_use]
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::Smooth,
            2 => Self::Rigid,
            _ => Self::None,
        }
    }

    #[must_use]
    pub fn is_smooth(self) -> bool {
        self == Self::Smooth
    }
}

/// One decoded mesh vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    /// Packed colour, `B | G << 8 | R << 16 | A << 24`.
    pub color: u32,
    pub uv: [Vec2; 3],
    /// Bone indices into the owning model's bone list.
    pub bone_indices: Vec<usize>,
    pub bone_weights: Vec<f32>,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            tangent: Vec3::ZERO,
            color: DEFAULT_VERTEX_COLOR,
            uv: [Vec2::ZERO; 3],
            bone_indices: Vec::new(),
            bone_weights: Vec::new(),
        }
    }
}

impl Vertex {
    /// Unpack [`Vertex::color`] into `[r, g, b, a]`.
    #[must_use]
    pub fn color_rgba(&self) -> [u8; 4] {
        let [b, g, r, a] = self.color.to_le_bytes();
        [r, g, b, a]
    }

    /// Scale the bone weights down so they sum to at most 1.
    pub fn normalize_weights(&mut self) {
        let sum: f32 = self.bone_weights.iter().sum();
        if sum > 1.0 {
            for weight in &mut self.bone_weights {
                *weight /= sum;
            }
        }
    }
}

/// Pack 8-bit channels into the vertex colour word.
#[must_use]
pub fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from(b) | (u32::from(g) << 8) | (u32::from(r) << 16) | (u32::from(a) << 24)
}

/// One drawable sub-mesh. Vertices form a triangle list in draw order.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    /// Index into [`SceneModel::materials`]; `None` when the source named a
    /// material the model does not have.
    pub material_id: Option<usize>,
    pub visible: bool,
    pub render_priority: u16,
    pub skinning: SkinningMode,
    pub vertices: Vec<Vertex>,
    pub has_normal: bool,
    pub has_tangent: bool,
    pub has_color: bool,
    pub has_node: bool,
    pub has_weight: bool,
    /// Number of texture coordinate sets present (0-3).
    pub uv_count: usize,
}

/// Texture wrap mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureWrap {
    ClampToEdge,
    ClampToBorder,
    #[default]
    Repeat,
    Mirror,
}

impl TextureWrap {
    #[must_use]
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::ClampToEdge,
            1 => Self::ClampToBorder,
            3 => Self::Mirror,
            _ => Self::Repeat,
        }
    }

    /// COLLADA `wrap_s`/`wrap_t` value.
    #[must_use]
    pub fn as_collada(self) -> &'static str {
        match self {
            Self::ClampToEdge => "CLAMP",
            Self::ClampToBorder => "BORDER",
            Self::Repeat => "WRAP",
            Self::Mirror => "MIRROR",
        }
    }
}

/// UV transform for one texture slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureCoordinator {
    pub projection: u32,
    pub reference_camera: u32,
    pub scale: Vec2,
    pub rotate: f32,
    pub translate: Vec2,
}

impl Default for TextureCoordinator {
    fn default() -> Self {
        Self {
            projection: 0,
            reference_camera: 0,
            scale: Vec2::ONE,
            rotate: 0.0,
            translate: Vec2::ZERO,
        }
    }
}

/// Sampler state for one texture slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextureMapper {
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
    pub mag_filter: u32,
    pub min_filter: u32,
    pub lod_bias: f32,
    pub border_color: [u8; 4],
}

/// Surface description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub name: String,
    /// Texture names bound to slots 0-2 (empty when unused).
    pub textures: [String; 3],
    pub coordinators: [TextureCoordinator; 3],
    pub mappers: [TextureMapper; 3],
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// First non-empty texture name, used as the diffuse image.
    #[must_use]
    pub fn diffuse_texture(&self) -> Option<&str> {
        self.textures.iter().map(String::as_str).find(|t| !t.is_empty())
    }
}

/// Skeleton node.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Parent index, `-1` for roots. Always lower than the bone's own index.
    pub parent_id: i32,
    pub scale: Vec3,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: Vec3,
    pub translation: Vec3,
    /// Scale after multiplying in every ancestor's local scale.
    pub absolute_scale: Vec3,
}

impl Bone {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_id: i32) -> Self {
        Self {
            name: name.into(),
            parent_id,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
            translation: Vec3::ZERO,
            absolute_scale: Vec3::ONE,
        }
    }

    #[must_use]
    pub fn with_srt(mut self, scale: Vec3, rotation: Vec3, translation: Vec3) -> Self {
        self.scale = scale;
        self.absolute_scale = scale;
        self.rotation = rotation;
        self.translation = translation;
        self
    }

    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        usize::try_from(self.parent_id).ok()
    }
}

/// Top-level decode result: one model with its geometry, rig and materials.
#[derive(Debug, Clone)]
pub struct SceneModel {
    pub name: String,
    pub transform: Mat4,
    pub bones: Vec<Bone>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for SceneModel {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Mat4::IDENTITY,
            bones: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }
}

impl SceneModel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Widen the bounding box to include `point`.
    pub fn widen_bounds(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// True once at least one point has been added to the bounds.
    #[must_use]
    pub fn has_bounds(&self) -> bool {
        self.min.x <= self.max.x
    }

    #[must_use]
    pub fn has_skeleton(&self) -> bool {
        !self.bones.is_empty()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }
}

/// Keyframes for one bone. A channel with one key is constant, an empty
/// channel falls back to the bind pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneTrack {
    pub bone_name: String,
    pub scale: Vec<Vec3>,
    pub rotation: Vec<Vec3>,
    pub translation: Vec<Vec3>,
}

impl BoneTrack {
    /// Sample `(scale, rotation, translation)` at `frame`, using `bind` for
    /// channels without keys.
    #[must_use]
    pub fn sample(&self, frame: usize, bind: &Bone) -> (Vec3, Vec3, Vec3) {
        (
            sample_channel(&self.scale, frame).unwrap_or(bind.scale),
            sample_channel(&self.rotation, frame).unwrap_or(bind.rotation),
            sample_channel(&self.translation, frame).unwrap_or(bind.translation),
        )
    }
}

fn sample_channel(keys: &[Vec3], frame: usize) -> Option<Vec3> {
    match keys.len() {
        0 => None,
        1 => Some(keys[0]),
        n => Some(keys[frame.min(n - 1)]),
    }
}

/// Skeletal animation clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub frame_count: usize,
    pub fps: f32,
    pub looping: bool,
    pub tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    /// Clip length in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        if self.fps <= 0.0 || self.frame_count == 0 {
            0.0
        } else {
            (self.frame_count - 1) as f32 / self.fps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_weights_only_scales_down() {
        let mut heavy = Vertex {
            bone_weights: vec![1.5, 0.5],
            ..Vertex::default()
        };
        heavy.normalize_weights();
        assert_eq!(heavy.bone_weights, vec![0.75, 0.25]);

        let mut light = Vertex {
            bone_weights: vec![0.25, 0.25],
            ..Vertex::default()
        };
        light.normalize_weights();
        assert_eq!(light.bone_weights, vec![0.25, 0.25]);
    }

    #[test]
    fn test_bounds_start_empty_and_widen() {
        let mut model = SceneModel::new("m");
        assert!(!model.has_bounds());

        model.widen_bounds(Vec3::new(1.0, -2.0, 3.0));
        model.widen_bounds(Vec3::new(-1.0, 5.0, 0.0));

        assert!(model.has_bounds());
        assert_eq!(model.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(model.max, Vec3::new(1.0, 5.0, 3.0));
    }

    #[test]
    fn test_pack_color_is_bgra() {
        assert_eq!(pack_color(255, 128, 0, 255), 128 << 8 | 255 << 16 | 255 << 24);
        let vertex = Vertex {
            color: pack_color(1, 2, 3, 4),
            ..Vertex::default()
        };
        assert_eq!(vertex.color_rgba(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_track_sampling() {
        let bind = Bone::new("root", -1);
        let track = BoneTrack {
            bone_name: "root".into(),
            scale: vec![],
            rotation: vec![Vec3::X],
            translation: vec![Vec3::ZERO, Vec3::ONE],
        };
        let (s, r, t) = track.sample(5, &bind);
        assert_eq!(s, Vec3::ONE);
        assert_eq!(r, Vec3::X);
        assert_eq!(t, Vec3::ONE);
    }
}
