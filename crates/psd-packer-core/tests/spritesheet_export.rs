mod common;

use common::{LayerSpec, PsdBuilder, group};
use image::RgbaImage;
use psd_packer_core::error::PsdPackerError;
use psd_packer_core::prelude::*;
use psd_packer_core::{
    convert, export_psd_with_progress, final_atlas_height, from_json_str, to_json, to_json_string,
};

fn blank_frame(anim: &str, n: u32, w: u32, h: u32) -> Frame {
    Frame {
        filename: format!("{anim}/{n}"),
        anim_name: anim.to_string(),
        frame_number: n,
        image: RgbaImage::new(w, h),
    }
}

fn two_anim_psd() -> Vec<u8> {
    let walk = group(
        "anim - walk",
        vec![
            LayerSpec::solid("2", 0, 0, 8, 8, [0, 255, 0, 255]),
            LayerSpec::solid("1", 0, 0, 8, 8, [255, 0, 0, 255]),
        ],
    );
    let idle = group(
        "anim-idle",
        vec![LayerSpec::solid("1", 2, 2, 4, 4, [0, 0, 255, 255]).compression(1)],
    );
    PsdBuilder::new(8, 8)
        .layer(LayerSpec::solid("background", 0, 0, 8, 8, [9, 9, 9, 255]))
        .layers(walk)
        .layers(idle)
        .build()
}

#[test]
fn overflow_splits_frames_across_atlases() {
    let frames = vec![blank_frame("a", 1, 64, 64), blank_frame("a", 2, 64, 64)];
    let packing = pack_frames_into_atlases(&frames, 64, 0);
    assert_eq!(packing.atlases.len(), 2);
    assert!(packing.dropped.is_empty());
    assert_eq!(packing.atlases[0].frames[0].frame_index, 0);
    assert_eq!(packing.atlases[1].frames[0].frame_index, 1);
    assert_eq!((packing.atlases[1].frames[0].x, packing.atlases[1].frames[0].y), (0, 0));
}

#[test]
fn frames_larger_than_an_atlas_are_dropped() {
    let frames = vec![
        blank_frame("a", 1, 16, 16),
        blank_frame("a", 2, 65, 8),
        blank_frame("a", 3, 16, 16),
    ];
    let packing = pack_frames_into_atlases(&frames, 64, 0);
    assert_eq!(packing.dropped, [1]);
    assert_eq!(packing.atlases.len(), 1);
    let placed: Vec<usize> = packing.atlases[0].frames.iter().map(|f| f.frame_index).collect();
    assert_eq!(placed, [0, 2]);
}

#[test]
fn atlas_height_is_pow2_clamped() {
    assert_eq!(final_atlas_height(0, 4096), 16);
    assert_eq!(final_atlas_height(5, 4096), 16);
    assert_eq!(final_atlas_height(16, 4096), 16);
    assert_eq!(final_atlas_height(17, 4096), 32);
    assert_eq!(final_atlas_height(300, 4096), 512);
    assert_eq!(final_atlas_height(300, 256), 256);
    assert_eq!(final_atlas_height(5000, 8192), 4096);
}

#[test]
fn export_produces_images_and_descriptor() {
    let cfg = SpritesheetConfig::builder()
        .atlas_size(64)
        .padding(1)
        .base_name("hero")
        .build();
    let out = export_psd(&two_anim_psd(), &cfg).expect("export");

    assert_eq!(out.images.len(), 1);
    assert_eq!(out.images[0].filename, "hero.png");
    // Three 8x8 frames (9x9 slots) on one shelf -> 9 rows used -> 16.
    assert_eq!(out.images[0].rgba.dimensions(), (64, 16));
    assert!(out.dropped.is_empty());

    let d = &out.descriptor;
    // Animations are concatenated top-to-bottom: idle sits above walk.
    let names: Vec<&str> = d.frames.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, ["idle/1", "walk/1", "walk/2"]);
    assert_eq!(d.animations["walk"], ["walk/1", "walk/2"]);
    assert_eq!(d.animations["idle"], ["idle/1"]);
    assert_eq!(d.frames[1].frame, Rect::new(9, 0, 8, 8));
    assert_eq!(d.frames[1].source_size, Size::new(8, 8));
    assert_eq!(d.meta.app, "psd-packer");
    assert_eq!(d.meta.images[0].size, Size::new(64, 16));

    let atlas = &out.images[0].rgba;
    // idle/1 is a 4x4 layer at (2,2) on an 8x8 document canvas.
    assert_eq!(atlas.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(atlas.get_pixel(3, 3).0, [0, 0, 255, 255]);
    assert_eq!(atlas.get_pixel(9, 0).0, [255, 0, 0, 255]);
    assert_eq!(atlas.get_pixel(18, 7).0, [0, 255, 0, 255]);
}

#[test]
fn descriptor_json_shape() {
    let cfg = SpritesheetConfig::builder().atlas_size(64).build();
    let out = export_psd(&two_anim_psd(), &cfg).expect("export");
    let v = to_json(&out.descriptor).expect("json value");
    let frame = &v["frames"][0];
    assert_eq!(frame["filename"], "idle/1");
    assert!(frame["frame"]["x"].is_u64());
    assert_eq!(frame["sourceSize"]["w"], 8);
    assert_eq!(frame["atlas"], 0);
    assert_eq!(v["animations"]["walk"][1], "walk/2");
    assert_eq!(v["meta"]["images"][0]["filename"], "spritesheet.png");

    let text = to_json_string(&out.descriptor).expect("json");
    let back = from_json_str(&text).expect("parse");
    assert_eq!(back, out.descriptor);
}

#[test]
fn frames_follow_layer_tree_order_not_name_order() {
    let bytes = PsdBuilder::new(4, 4)
        .layers(group("anim-attack", vec![LayerSpec::solid("1", 0, 0, 4, 4, [1, 1, 1, 255])]))
        .layers(group("anim-zoom", vec![LayerSpec::solid("1", 0, 0, 4, 4, [2, 2, 2, 255])]))
        .build();
    let doc = decode(&bytes).expect("decode");
    assert_eq!(doc.animation_order, ["zoom", "attack"]);

    let cfg = SpritesheetConfig::builder().atlas_size(16).build();
    let out = convert(&doc, &cfg, |_| {}).expect("export");
    let names: Vec<&str> = out.descriptor.frames.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, ["zoom/1", "attack/1"]);
    assert_eq!(out.images[0].rgba.get_pixel(0, 0).0, [2, 2, 2, 255]);
}

#[test]
fn malformed_descriptor_is_a_descriptor_error() {
    assert!(matches!(
        from_json_str(r#"{ "frames": 3 }"#),
        Err(PsdPackerError::Descriptor(_))
    ));
    assert!(matches!(from_json_str("not json"), Err(PsdPackerError::Descriptor(_))));
}

#[test]
fn multiple_atlases_get_indexed_names() {
    let cfg = SpritesheetConfig::builder()
        .atlas_size(8)
        .base_name("sheet")
        .build();
    let out = export_psd(&two_anim_psd(), &cfg).expect("export");
    let names: Vec<&str> = out.images.iter().map(|i| i.filename.as_str()).collect();
    assert_eq!(names, ["sheet_0.png", "sheet_1.png", "sheet_2.png"]);
    // Height never exceeds the atlas size even though 16 is the floor.
    assert!(out.images.iter().all(|i| i.rgba.dimensions() == (8, 8)));
    let atlases: Vec<usize> = out.descriptor.frames.iter().map(|f| f.atlas).collect();
    assert_eq!(atlases, [0, 1, 2]);
    assert_eq!(out.descriptor.frames_on_atlas(1).count(), 1);
}

#[test]
fn resolution_rescales_frames() {
    let cfg = SpritesheetConfig::builder()
        .atlas_size(64)
        .resolution(Some((4, 4)))
        .build();
    let out = export_psd(&two_anim_psd(), &cfg).expect("export");
    assert!(out.descriptor.frames.iter().all(|f| f.frame.w == 4 && f.frame.h == 4));
    assert_eq!(out.descriptor.frames[2].frame.x, 8);

    // Matching the document size is a no-op.
    let same = SpritesheetConfig::builder()
        .atlas_size(64)
        .resolution(Some((8, 8)))
        .build();
    let out = export_psd(&two_anim_psd(), &same).expect("export");
    assert!(out.descriptor.frames.iter().all(|f| f.source_size == Size::new(8, 8)));
}

#[test]
fn dropped_frames_are_reported_and_left_out() {
    let doc = decode(&two_anim_psd()).expect("decode");
    // A 4px atlas cannot hold any 8x8 frame.
    let cfg = SpritesheetConfig::builder().atlas_size(4).build();
    let out = convert(&doc, &cfg, |_| {}).expect("export");
    assert_eq!(out.dropped, ["idle/1", "walk/1", "walk/2"]);
    assert!(out.images.is_empty());
    assert!(out.descriptor.frames.is_empty());
    assert!(out.descriptor.animations.is_empty());
    assert_eq!(out.stats().num_dropped, 3);
}

#[test]
fn progress_reports_every_stage_in_order() {
    let mut seen = Vec::new();
    let cfg = SpritesheetConfig::builder().atlas_size(64).build();
    export_psd_with_progress(&two_anim_psd(), &cfg, |s| seen.push(s.percent())).expect("export");
    assert_eq!(seen, [0, 20, 40, 60, 80, 100]);
}

#[test]
fn document_without_animations_is_an_error() {
    let bytes = PsdBuilder::new(8, 8)
        .layer(LayerSpec::solid("background", 0, 0, 8, 8, [1, 1, 1, 255]))
        .build();
    let cfg = SpritesheetConfig::default();
    assert!(matches!(export_psd(&bytes, &cfg), Err(PsdPackerError::Empty)));
}

#[test]
fn invalid_config_fails_before_decoding() {
    let cfg = SpritesheetConfig::builder().atlas_size(8192).build();
    assert!(matches!(
        export_psd(b"not a psd", &cfg),
        Err(PsdPackerError::InvalidConfig(_))
    ));
}

#[test]
fn stats_describe_occupancy() {
    let cfg = SpritesheetConfig::builder().atlas_size(64).build();
    let out = export_psd(&two_anim_psd(), &cfg).expect("export");
    let stats = out.stats();
    assert_eq!(stats.num_atlases, 1);
    assert_eq!(stats.num_frames, 3);
    assert_eq!(stats.total_atlas_area, 64 * 16);
    assert_eq!(stats.used_frame_area, 3 * 64);
    assert_eq!(stats.wasted_area(), 64 * 16 - 3 * 64);
    assert!(stats.summary().contains("Frames: 3"));
}
