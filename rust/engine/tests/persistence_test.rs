// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON persistence and baking

mod common;

use approx::assert_relative_eq;
use common::*;
use decal_lite_engine::{
    DecalContext, DecalMaterial, HeadlessHost, InstanceKey, ProjectionRequest, RendererProjection,
    TextureHandle,
};
use decal_lite_geometry::{CompactedUvBuffers, Placement, Point3, SubmeshMask, UnitQuaternion, Vector3};

fn compacted(context: &DecalContext, key: InstanceKey) -> CompactedUvBuffers {
    match context.instance(key).unwrap().projection(0) {
        Some(RendererProjection::Compacted(buffers)) => buffers.clone(),
        other => panic!("expected compacted buffers, got {other:?}"),
    }
}

#[test]
fn skinned_decal_round_trips_with_exact_offsets() {
    let mut host = HeadlessHost::new();
    let mut original = DecalContext::default();
    let object = original.register_object(skinned_object(4)).unwrap();
    let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3);
    let placement = Placement::new(Point3::new(0.3, -0.2, 0.0), rotation, Vector3::new(0.7, 0.5, 1.0));
    let request = ProjectionRequest::new(
        object,
        placement,
        DecalMaterial::new(TextureHandle(11)).with_normal_map(TextureHandle(12)),
    )
    .with_priority(6)
    .with_tint([0.5, 0.25, 1.0, 1.0]);
    let key = original.project(request, &mut host).unwrap().unwrap();
    let buffers = compacted(&original, key);

    let json = original.to_json().unwrap();

    let mut restored = DecalContext::default();
    let target = restored.register_object(skinned_object(4)).unwrap();
    let report = restored.restore_json(&json, &mut host).unwrap();
    assert_eq!(report.restored, 1);

    let restored_key = restored.object(target).unwrap().decals().next().unwrap();
    let restored_buffers = compacted(&restored, restored_key);
    assert_eq!(restored_buffers.near_offset, buffers.near_offset);
    assert_eq!(restored_buffers.far_offset, buffers.far_offset);
    assert_eq!(restored_buffers, buffers);

    let instance = restored.instance(restored_key).unwrap();
    assert_eq!(instance.priority(), 6);
    assert_eq!(instance.tint(), [0.5, 0.25, 1.0, 1.0]);
    assert_eq!(instance.material().normal_map, Some(TextureHandle(12)));
    assert_relative_eq!(instance.placement().position.x, 0.3, epsilon = 1e-6);
    assert_relative_eq!(instance.placement().scale.y, 0.5, epsilon = 1e-6);
    assert_relative_eq!(instance.placement().rotation.angle(), 0.3, epsilon = 1e-5);
}

#[test]
fn static_decal_is_recomputed_on_restore() {
    let mut host = HeadlessHost::new();
    let mut original = DecalContext::default();
    let object = original.register_object(static_object(1)).unwrap();
    original
        .project(
            decal(object, 0.0, 0.0).with_submesh_mask(SubmeshMask::all()),
            &mut host,
        )
        .unwrap()
        .unwrap();
    let snapshot = original.snapshot();
    assert_eq!(snapshot.decals.len(), 1);
    assert!(snapshot.decals[0].skinned.is_empty());

    let mut restored = DecalContext::default();
    let target = restored.register_object(static_object(1)).unwrap();
    restored.restore(&snapshot, &mut host).unwrap();

    let key = restored.object(target).unwrap().decals().next().unwrap();
    assert!(matches!(
        restored.instance(key).unwrap().projection(0),
        Some(RendererProjection::Extracted(_))
    ));
}

#[test]
fn unknown_targets_are_skipped() {
    let mut host = HeadlessHost::new();
    let mut original = DecalContext::default();
    let object = original.register_object(static_object(1)).unwrap();
    original.project(decal(object, 0.0, 0.0), &mut host).unwrap();
    let json = original.to_json().unwrap();

    let mut restored = DecalContext::default();
    restored.register_object(static_object(2)).unwrap();
    let report = restored.restore_json(&json, &mut host).unwrap();
    assert_eq!((report.restored, report.unknown_targets), (0, 1));
    assert_eq!(restored.instance_count(), 0);
}

#[test]
fn snapshot_without_texture_restores_nothing() {
    let mut host = HeadlessHost::new();
    let mut original = DecalContext::default();
    let object = original.register_object(static_object(1)).unwrap();
    original.project(decal(object, 0.0, 0.0), &mut host).unwrap();
    original.project(decal(object, 0.1, 0.0), &mut host).unwrap();
    let mut snapshot = original.snapshot();
    snapshot.decals[1].texture = None;

    let mut restored = DecalContext::default();
    restored.register_object(static_object(1)).unwrap();
    assert!(restored.restore(&snapshot, &mut host).is_err());
    assert_eq!(restored.instance_count(), 0);
}

#[test]
fn bake_static_decal_uses_cached_extraction() {
    let mut host = HeadlessHost::new();
    let mut context = DecalContext::default();
    let object = context.register_object(static_object(1)).unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let (hits, misses) = context.extraction_cache_stats();

    let baked = context.bake(key).unwrap();
    assert_eq!(baked.len(), 1);
    let mesh = &baked[0].mesh;
    assert!(mesh.triangle_count() > 0);
    assert_eq!(mesh.uvs.len(), mesh.vertex_count() * 2);
    assert!(mesh.uvs.iter().all(|uv| uv.is_finite()));
    assert_eq!(context.extraction_cache_stats(), (hits, misses));
}

#[test]
fn bake_skinned_decal_keeps_bone_weights() {
    let mut host = HeadlessHost::new();
    let mut context = DecalContext::default();
    let object = context.register_object(skinned_object(1)).unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();

    let baked = context.bake(key).unwrap();
    assert_eq!(baked.len(), 1);
    let mesh = &baked[0].mesh;
    assert_eq!(mesh.bone_weights.len(), mesh.vertex_count());
    assert!(mesh.is_skinned());

    // Second bake is served from the cache
    let (hits, _) = context.extraction_cache_stats();
    context.bake(key).unwrap();
    assert_eq!(context.extraction_cache_stats().0, hits + 1);
}
