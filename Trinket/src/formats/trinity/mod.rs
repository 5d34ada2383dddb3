//! Trinity (Switch) model descriptors.
//!
//! A model is a `.trmdl` file referencing mesh (`.trmsh`), skeleton
//! (`.trskl`) and material (`.trmtr`) descriptors; meshes reference a buffer
//! file (`.trmbf`) and materials reference `.bntx` textures. Descriptors are
//! flatbuffers read through a [`DescriptorReader`].

pub mod descriptors;
pub mod flatbuffer;
pub mod scene;

pub use descriptors::{
    AnimationDescriptor, DescriptorKind, DescriptorReader, FlatbufferDescriptorReader,
    MaterialDescriptor, MeshBufferDescriptor, MeshDescriptor, ModelDescriptor,
    SkeletonDescriptor,
};
pub use scene::{ModelParts, decode_animation, decode_model, decode_skeleton, texture_name};
