//! Normalized scene representation produced by every model decoder.

pub mod skeleton;
pub mod types;

pub use skeleton::{
    SkeletonBuilder, bone_local_transform, local_transform, propagate_scale, world_transform,
    world_transforms,
};
pub use types::{
    AnimationClip, Bone, BoneTrack, DEFAULT_VERTEX_COLOR, Material, Mesh, SceneModel,
    SkinningMode, TextureCoordinator, TextureMapper, TextureWrap, Vertex, pack_color,
};
