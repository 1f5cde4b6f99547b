// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame driver: camera diffing, dispatch, reuse and fault isolation

mod common;

use common::*;
use decal_lite_engine::{
    params, CameraId, CameraState, CommandStage, DecalConfig, DecalContext, DrawGeometry,
    FrameStats, HeadlessHost, ModeKind, ObjectDesc, ParamValue, TextureHandle,
};

fn deferred_without_screen_space(id: u64) -> CameraState {
    CameraState::deferred(CameraId(id)).with_screen_space(false)
}

#[test]
fn static_decal_is_dispatched_once_and_reused() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let object = context.register_object(static_object(1)).unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = deferred_without_screen_space(1);

    let diff = context.begin_frame(&[camera], &mut host);
    assert_eq!(diff.added, 1);
    assert!(context.mark_visible(object));
    let stats = context.render_camera(camera.id, &mut host).unwrap();
    assert_eq!(
        stats,
        FrameStats {
            objects: 1,
            dispatched: 1,
            ..FrameStats::default()
        }
    );

    let realization = context.instance(key).unwrap().camera_instance(camera.id, 0).unwrap();
    assert_eq!(realization.mode(), ModeKind::StaticDeferred);
    let commands = host.commands_for(camera.id);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].stage, CommandStage::AfterGBuffer);
    assert!(matches!(commands[0].command.geometry, DrawGeometry::Mesh(_)));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    let stats = context.render_camera(camera.id, &mut host).unwrap();
    assert_eq!((stats.dispatched, stats.reused), (0, 1));
    assert_eq!(host.live_commands(), 1);
}

#[test]
fn visible_set_is_cleared_after_render() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let object = context.register_object(static_object(1)).unwrap();
    context.project(decal(object, 0.0, 0.0), &mut host).unwrap();
    let camera = CameraState::forward(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    assert_eq!(context.render_camera(camera.id, &mut host).unwrap().objects, 1);
    assert_eq!(context.render_camera(camera.id, &mut host).unwrap().objects, 0);
}

#[test]
fn screen_space_draws_one_cube_for_all_renderers() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let desc = ObjectDesc::new(1, vec![static_renderer(10, 0.0), static_renderer(11, 0.5)])
        .with_screen_space(true);
    let object = context.register_object(desc).unwrap();
    let key = context.project(decal(object, 0.4, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::deferred(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    let stats = context.render_camera(camera.id, &mut host).unwrap();

    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(
        context.instance(key).unwrap().camera_instance(camera.id, 0).unwrap().mode(),
        ModeKind::ScreenSpace
    );
    let commands = host.commands_for(camera.id);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].stage, CommandStage::BeforeLighting);
    assert!(matches!(commands[0].command.geometry, DrawGeometry::UnitCube));
    assert!(commands[0].command.params.get(params::WORLD_TO_DECAL).is_some());
}

#[test]
fn screen_space_kill_switch_falls_back_to_mesh_decals() {
    let config = DecalConfig {
        screen_space: false,
        ..DecalConfig::default()
    };
    let mut context = DecalContext::new(config);
    let mut host = HeadlessHost::new();
    let object = context
        .register_object(static_object(1).with_screen_space(true))
        .unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::deferred(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    context.render_camera(camera.id, &mut host).unwrap();
    assert_eq!(
        context.instance(key).unwrap().camera_instance(camera.id, 0).unwrap().mode(),
        ModeKind::StaticDeferred
    );
}

#[test]
fn deactivated_camera_releases_everything() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let object = context.register_object(skinned_object(1)).unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let first = CameraState::forward(CameraId(1));
    let second = deferred_without_screen_space(2);

    context.begin_frame(&[first, second], &mut host);
    for camera in [first, second] {
        context.mark_visible(object);
        context.render_camera(camera.id, &mut host).unwrap();
    }
    assert_eq!(context.instance(key).unwrap().camera_instance_count(), 2);

    let diff = context.begin_frame(&[second], &mut host);
    assert_eq!((diff.removed, diff.disposed), (1, 1));
    assert!(host.commands_for(first.id).is_empty());
    assert_eq!(host.commands_for(second.id).len(), 1);
    assert!(!context.is_camera_active(first.id));

    context.begin_frame(&[], &mut host);
    assert!(host.is_idle());
    assert_eq!(context.instance(key).unwrap().camera_instance_count(), 0);
}

#[test]
fn technique_change_disposes_and_redispatches() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let object = context.register_object(static_object(1)).unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let deferred = deferred_without_screen_space(5);

    context.begin_frame(&[deferred], &mut host);
    context.mark_visible(object);
    context.render_camera(deferred.id, &mut host).unwrap();

    let forward = CameraState::forward(CameraId(5));
    let diff = context.begin_frame(&[forward], &mut host);
    assert_eq!((diff.technique_changed, diff.disposed), (1, 1));
    assert!(host.is_idle());

    context.mark_visible(object);
    let stats = context.render_camera(forward.id, &mut host).unwrap();
    assert_eq!(stats.dispatched, 1);
    assert_eq!(
        context.instance(key).unwrap().camera_instance(forward.id, 0).unwrap().mode(),
        ModeKind::StaticForward
    );
    assert_eq!(host.commands_for(forward.id)[0].stage, CommandStage::AfterForwardOpaque);
}

#[test]
fn failing_object_does_not_abort_the_frame() {
    init_tracing();
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new().with_buffer_budget(0);
    let skinned = context.register_object(skinned_object(1)).unwrap();
    let rigid = context.register_object(static_object(2)).unwrap();
    let skinned_decal = context.project(decal(skinned, 0.0, 0.0), &mut host).unwrap().unwrap();
    context.project(decal(rigid, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::forward(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(skinned);
    context.mark_visible(rigid);
    let stats = context.render_camera(camera.id, &mut host).unwrap();

    assert_eq!(stats.objects, 2);
    assert_eq!(stats.faults, 1);
    assert_eq!(stats.dispatched, 1);
    assert_eq!(host.live_buffers(), 0);
    assert_eq!(host.live_commands(), 1);
    assert_eq!(context.instance(skinned_decal).unwrap().camera_instance_count(), 0);

    // Recovers once memory is available again
    host.set_buffer_budget(None);
    context.mark_visible(skinned);
    context.mark_visible(rigid);
    let stats = context.render_camera(camera.id, &mut host).unwrap();
    assert_eq!((stats.dispatched, stats.reused, stats.faults), (1, 1, 0));
    assert!(host.live_buffers() >= 1);
}

#[test]
fn unknown_camera_is_an_error() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let object = context.register_object(static_object(1)).unwrap();
    context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::forward(CameraId(1));
    context.begin_frame(&[camera], &mut host);

    context.mark_visible(object);
    assert!(context.render_camera(CameraId(9), &mut host).is_err());

    // The failed pass still consumed the visible set
    let stats = context.render_camera(camera.id, &mut host).unwrap();
    assert_eq!(stats.objects, 0);
    assert_eq!(host.live_commands(), 0);
}

#[test]
fn screen_space_is_opt_in_per_object() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let object = context
        .register_object(ObjectDesc::new(1, vec![skinned_renderer(10)]))
        .unwrap();
    assert!(!context.object(object).unwrap().allows_screen_space());
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::deferred(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    context.render_camera(camera.id, &mut host).unwrap();

    assert_eq!(
        context.instance(key).unwrap().camera_instance(camera.id, 0).unwrap().mode(),
        ModeKind::SkinnedDeferred
    );
}

#[test]
fn decal_in_gap_between_renderers_is_dropped() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let desc = ObjectDesc::new(1, vec![static_renderer(10, 0.0), static_renderer(11, 5.0)]);
    let object = context.register_object(desc).unwrap();

    // Inside the object's bounds, touching neither renderer
    assert!(context.project(decal(object, 2.5, 0.0), &mut host).unwrap().is_none());
    assert_eq!(context.instance_count(), 0);
    assert_eq!(context.object(object).unwrap().decal_count(), 0);
}

#[test]
fn unreadable_renderer_uses_whole_object_material() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let desc = ObjectDesc::new(1, vec![static_renderer(10, 0.0).unreadable()]);
    let object = context.register_object(desc).unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::forward(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    context.render_camera(camera.id, &mut host).unwrap();

    let realization = context.instance(key).unwrap().camera_instance(camera.id, 0).unwrap();
    assert_eq!(realization.mode(), ModeKind::WholeObject);
    assert_eq!(realization.materials().len(), 1);
    let material = host.material_params(realization.materials()[0]).unwrap();
    assert_eq!(
        material.get(params::DECAL_TEXTURE),
        Some(&ParamValue::Texture(TextureHandle(7)))
    );

    context.remove_decal(key, &mut host);
    assert!(host.is_idle());
}

#[test]
fn whole_object_fallback_can_be_disabled() {
    let config = DecalConfig {
        whole_object_fallback: false,
        ..DecalConfig::default()
    };
    let mut context = DecalContext::new(config);
    let mut host = HeadlessHost::new();
    let desc = ObjectDesc::new(1, vec![static_renderer(10, 0.0).unreadable()]);
    let object = context.register_object(desc).unwrap();
    context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::forward(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    let stats = context.render_camera(camera.id, &mut host).unwrap();
    assert_eq!((stats.dispatched, stats.skipped), (0, 1));
    assert!(host.is_idle());
}

#[test]
fn disabling_releases_and_skips() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let object = context.register_object(static_object(1)).unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::forward(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    context.render_camera(camera.id, &mut host).unwrap();

    context.set_instance_enabled(key, false, &mut host).unwrap();
    assert!(host.is_idle());
    context.mark_visible(object);
    let stats = context.render_camera(camera.id, &mut host).unwrap();
    assert_eq!((stats.dispatched, stats.skipped), (0, 1));

    context.set_instance_enabled(key, true, &mut host).unwrap();
    context.set_object_enabled(object, false, &mut host).unwrap();
    assert!(!context.mark_visible(object));

    context.set_object_enabled(object, true, &mut host).unwrap();
    assert!(context.mark_visible(object));
    assert_eq!(context.render_camera(camera.id, &mut host).unwrap().dispatched, 1);
}

#[test]
fn tint_change_rebuilds_realization() {
    let mut context = DecalContext::default();
    let mut host = HeadlessHost::new();
    let object = context.register_object(static_object(1)).unwrap();
    let key = context.project(decal(object, 0.0, 0.0), &mut host).unwrap().unwrap();
    let camera = CameraState::forward(CameraId(1));

    context.begin_frame(&[camera], &mut host);
    context.mark_visible(object);
    context.render_camera(camera.id, &mut host).unwrap();

    let red = [1.0, 0.0, 0.0, 1.0];
    context.set_tint(key, red, &mut host).unwrap();
    assert!(host.is_idle());

    context.mark_visible(object);
    context.render_camera(camera.id, &mut host).unwrap();
    let commands = host.commands_for(camera.id);
    assert_eq!(commands[0].command.params.get(params::TINT), Some(&ParamValue::Color(red)));
}
