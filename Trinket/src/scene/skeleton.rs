//! Bone hierarchy construction.
//!
//! Bones live in a flat array where every parent precedes its children, so all
//! hierarchy walks here are plain loops over parent indices.

use glam::{Mat4, Vec3};

use super::types::Bone;
use crate::error::{Error, Result};

/// Local transform of a bone: scale, then rotate X, Y, Z, then translate.
#[must_use]
pub fn local_transform(scale: Vec3, rotation: Vec3, translation: Vec3) -> Mat4 {
    Mat4::from_translation(translation)
        * Mat4::from_rotation_z(rotation.z)
        * Mat4::from_rotation_y(rotation.y)
        * Mat4::from_rotation_x(rotation.x)
        * Mat4::from_scale(scale)
}

/// Local transform from a bone's own SRT.
#[must_use]
pub fn bone_local_transform(bone: &Bone) -> Mat4 {
    local_transform(bone.scale, bone.rotation, bone.translation)
}

/// Accumulated world transform of `index`, composed from the bone up to the
/// root. Stops after `bones.len()` steps.
#[must_use]
pub fn world_transform(bones: &[Bone], index: usize) -> Mat4 {
    let Some(bone) = bones.get(index) else {
        return Mat4::IDENTITY;
    };

    let mut matrix = bone_local_transform(bone);
    let mut parent = bone.parent();
    let mut steps = 0;
    while let Some(p) = parent {
        if steps >= bones.len() {
            break;
        }
        let Some(ancestor) = bones.get(p) else { break };
        matrix = bone_local_transform(ancestor) * matrix;
        parent = ancestor.parent();
        steps += 1;
    }
    matrix
}

/// World transforms for every bone, in bone order.
#[must_use]
pub fn world_transforms(bones: &[Bone]) -> Vec<Mat4> {
    let mut worlds: Vec<Mat4> = Vec::with_capacity(bones.len());
    for (i, bone) in bones.iter().enumerate() {
        let local = bone_local_transform(bone);
        let world = match bone.parent() {
            Some(p) if p < i => worlds[p] * local,
            _ => local,
        };
        worlds.push(world);
    }
    worlds
}

/// Multiply each bone's absolute scale and translation by the local scale of
/// every ancestor.
///
/// Ancestor scales are read from `scale`, which this pass never modifies, so
/// the result does not depend on processing order.
pub fn propagate_scale(bones: &mut [Bone]) {
    for i in 0..bones.len() {
        let mut absolute_scale = bones[i].scale;
        let mut translation = bones[i].translation;

        let mut parent = bones[i].parent();
        let mut steps = 0;
        while let Some(p) = parent {
            if p >= bones.len() || steps >= bones.len() {
                break;
            }
            let ancestor_scale = bones[p].scale;
            absolute_scale *= ancestor_scale;
            translation *= ancestor_scale;
            parent = bones[p].parent();
            steps += 1;
        }

        bones[i].absolute_scale = absolute_scale;
        bones[i].translation = translation;
    }
}

/// Collects bones while checking the parent-before-child ordering.
#[derive(Debug, Default)]
pub struct SkeletonBuilder {
    bones: Vec<Bone>,
}

impl SkeletonBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bones: Vec::with_capacity(capacity),
        }
    }

    /// Append a bone and return its index.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBoneParent`] if the parent id is neither `-1`
    /// nor the index of a bone already added.
    pub fn push(&mut self, bone: Bone) -> Result<usize> {
        let index = self.bones.len();
        let valid = bone.parent_id == -1
            || usize::try_from(bone.parent_id).is_ok_and(|p| p < index);
        if !valid {
            return Err(Error::InvalidBoneParent {
                bone: index,
                parent: bone.parent_id,
            });
        }
        self.bones.push(bone);
        Ok(index)
    }

    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// World transforms of the bones added so far.
    #[must_use]
    pub fn world_transforms(&self) -> Vec<Mat4> {
        world_transforms(&self.bones)
    }

    /// Run scale propagation and return the finished bone list.
    #[must_use]
    pub fn finish(mut self) -> Vec<Bone> {
        propagate_scale(&mut self.bones);
        self.bones
    }

    /// Return the bone list without scale propagation.
    #[must_use]
    pub fn into_bones(self) -> Vec<Bone> {
        self.bones
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn chain() -> SkeletonBuilder {
        let mut builder = SkeletonBuilder::new();
        builder
            .push(Bone::new("root", -1).with_srt(
                Vec3::splat(2.0),
                Vec3::ZERO,
                Vec3::new(0.0, 1.0, 0.0),
            ))
            .unwrap();
        builder
            .push(Bone::new("mid", 0).with_srt(
                Vec3::new(1.0, 3.0, 1.0),
                Vec3::ZERO,
                Vec3::new(1.0, 1.0, 1.0),
            ))
            .unwrap();
        builder
            .push(Bone::new("leaf", 1).with_srt(
                Vec3::new(0.5, 1.0, 4.0),
                Vec3::ZERO,
                Vec3::new(1.0, 2.0, 3.0),
            ))
            .unwrap();
        builder
    }

    #[test]
    fn test_parent_must_precede_child() {
        let mut builder = SkeletonBuilder::new();
        builder.push(Bone::new("root", -1)).unwrap();
        assert!(matches!(
            builder.push(Bone::new("self", 1)),
            Err(Error::InvalidBoneParent { bone: 1, parent: 1 })
        ));
        assert!(builder.push(Bone::new("bad", -5)).is_err());
        assert_eq!(builder.push(Bone::new("ok", 0)).unwrap(), 1);
    }

    #[test]
    fn test_absolute_scale_includes_every_ancestor() {
        let bones = chain().finish();

        assert_eq!(bones[0].absolute_scale, Vec3::splat(2.0));
        assert_eq!(bones[1].absolute_scale, Vec3::new(2.0, 6.0, 2.0));
        // leaf scale * mid scale * root scale
        assert_eq!(bones[2].absolute_scale, Vec3::new(1.0, 6.0, 8.0));
        assert_eq!(bones[2].translation, Vec3::new(2.0, 12.0, 6.0));
        // local scale is untouched
        assert_eq!(bones[2].scale, Vec3::new(0.5, 1.0, 4.0));
    }

    #[test]
    fn test_world_transform_matches_chain_walk() {
        let builder = chain();
        let worlds = builder.world_transforms();
        for i in 0..builder.len() {
            let walked = world_transform(builder.bones(), i);
            assert!(walked.abs_diff_eq(worlds[i], 1e-5));
        }
    }

    #[test]
    fn test_rotation_order_is_x_then_y_then_z() {
        let m = local_transform(Vec3::ONE, Vec3::new(FRAC_PI_2, FRAC_PI_2, 0.0), Vec3::ZERO);
        // X then Y: +Y -> +Z -> +X
        let p = m.transform_point3(Vec3::Y);
        assert!(p.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_world_transform_applies_parent() {
        let mut builder = SkeletonBuilder::new();
        builder
            .push(Bone::new("root", -1).with_srt(Vec3::ONE, Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        builder
            .push(Bone::new("child", 0).with_srt(Vec3::ONE, Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();

        let world = world_transform(builder.bones(), 1);
        assert!(world
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(10.0, 5.0, 0.0), 1e-5));
    }
}
