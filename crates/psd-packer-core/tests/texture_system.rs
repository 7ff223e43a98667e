mod common;

use std::sync::Arc;

use common::{LayerSpec, PsdBuilder, group};
use image::{Rgba, RgbaImage};
use psd_packer_core::prelude::*;

fn sheet() -> SpritesheetOutput {
    let bytes = PsdBuilder::new(4, 4)
        .layers(group(
            "anim - spin",
            vec![
                LayerSpec::solid("1", 0, 0, 4, 4, [10, 0, 0, 255]),
                LayerSpec::solid("2", 0, 0, 4, 4, [20, 0, 0, 255]),
                LayerSpec::solid("3", 0, 0, 4, 4, [30, 0, 0, 255]),
            ],
        ))
        .build();
    let cfg = SpritesheetConfig::builder().atlas_size(8).base_name("spin").build();
    export_psd(&bytes, &cfg).expect("export")
}

fn system() -> TextureSystem {
    TextureSystem::new(AtlasConfig::builder().atlas_size(64).padding(0).build()).expect("system")
}

fn register(sys: &mut TextureSystem, out: SpritesheetOutput) {
    let images = out.images.into_iter().map(|i| Arc::new(i.rgba)).collect();
    sys.register_spritesheet(&out.descriptor, images).expect("register");
}

#[test]
fn spritesheet_frames_resolve_to_atlas_pixels() {
    let out = sheet();
    // 8x8 atlas holds two 4x4 frames per shelf row.
    assert_eq!(out.images.len(), 1);
    let mut sys = system();
    register(&mut sys, out);

    let region = sys.get_texture("spin/3").expect("frame").clone();
    assert_eq!(region.rect(), Rect::new(0, 4, 4, 4));
    let pixels = sys.region_image(&region).expect("pixels");
    assert_eq!(pixels.get_pixel(region.x, region.y).0, [30, 0, 0, 255]);
    assert_eq!(sys.prebaked_atlases()[0].name, "spin.png");
}

#[test]
fn animation_frames_follow_playback_order() {
    let mut sys = system();
    register(&mut sys, sheet());
    assert_eq!(sys.animation_names().collect::<Vec<_>>(), ["spin"]);
    let frames = sys.animation_frames("spin").expect("spin");
    let xs: Vec<(u32, u32)> = frames.iter().map(|r| (r.x, r.y)).collect();
    assert_eq!(xs, [(0, 0), (4, 0), (0, 4)]);
    assert!(sys.animation_frames("missing").is_none());
}

#[test]
fn image_count_mismatch_is_rejected() {
    let out = sheet();
    let mut sys = system();
    let err = sys.register_spritesheet(&out.descriptor, Vec::new());
    assert!(matches!(err, Err(PsdPackerError::InvalidConfig(_))));
    assert!(!sys.has_texture("spin/1"));
}

#[test]
fn out_of_bounds_frame_is_rejected() {
    let mut sys = system();
    let img = Arc::new(RgbaImage::new(16, 16));
    let res = sys.register_atlas("bad", img, [("edge".to_string(), Rect::new(10, 10, 8, 8))]);
    assert!(matches!(res, Err(PsdPackerError::InvalidConfig(_))));
    assert!(sys.prebaked_atlases().is_empty());
}

#[test]
fn prebaked_frames_shadow_dynamic_textures() {
    let mut sys = system();
    let dynamic = sys
        .add_texture("coin", Arc::new(RgbaImage::from_pixel(2, 2, Rgba([1, 1, 1, 255]))))
        .expect("packed");
    assert_eq!(dynamic.atlas_index(), Some(0));

    let baked = Arc::new(RgbaImage::from_pixel(8, 8, Rgba([2, 2, 2, 255])));
    sys.register_atlas("items", baked, [("coin".to_string(), Rect::new(4, 4, 4, 4))])
        .expect("register");
    let found = sys.get_texture("coin").expect("coin");
    assert!(found.atlas_index().is_none());
    assert_eq!(found.rect(), Rect::new(4, 4, 4, 4));

    assert!(sys.remove_atlas("items"));
    assert!(!sys.remove_atlas("items"));
    let found = sys.get_texture("coin").expect("coin");
    assert!(Arc::ptr_eq(found, &dynamic));
}

#[test]
fn first_registered_atlas_wins_on_duplicate_ids() {
    let mut sys = system();
    let a = Arc::new(RgbaImage::new(8, 8));
    let b = Arc::new(RgbaImage::new(8, 8));
    sys.register_atlas("a", Arc::clone(&a), [("shared".to_string(), Rect::new(0, 0, 2, 2))])
        .expect("a");
    sys.register_atlas("b", Arc::clone(&b), [("shared".to_string(), Rect::new(4, 4, 2, 2))])
        .expect("b");
    let found = sys.get_texture("shared").expect("shared");
    assert!(Arc::ptr_eq(found.image().expect("image"), &a));

    // Re-registering "a" moves it behind "b".
    sys.register_atlas("a", a, [("shared".to_string(), Rect::new(0, 0, 2, 2))])
        .expect("a again");
    let found = sys.get_texture("shared").expect("shared");
    assert!(Arc::ptr_eq(found.image().expect("image"), &b));
}

#[test]
fn dynamic_groups_and_dirty_atlases() {
    let mut sys = system();
    sys.add_texture_to_group("ui", "btn", Arc::new(RgbaImage::new(4, 4)))
        .expect("ui");
    sys.add_texture("tile", Arc::new(RgbaImage::new(4, 4)))
        .expect("tile");
    assert_eq!(sys.dirty_atlases().count(), 2);
    sys.mark_all_clean();
    assert_eq!(sys.dirty_atlases().count(), 0);
    assert_eq!(sys.manager().atlas_count(), 2);

    sys.clear();
    assert!(!sys.has_texture("btn"));
    assert_eq!(sys.manager().atlas_count(), 0);
}
