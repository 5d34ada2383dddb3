//! Binary asset formats.
//!
//! - [`bch`]: 3DS model containers
//! - [`bntx`]: Switch texture containers
//! - [`trinity`]: Switch flatbuffer descriptors (models, meshes, materials,
//!   skeletons, animations)

pub mod bch;
pub mod bntx;
pub mod trinity;
