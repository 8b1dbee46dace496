// Property tests for geometry bounds, payload budget, form encoding and rect clamping
use findthings_vision::vision::{
    EncodeBudget, GeometryBounds, PixelRect, RasterImage, VisionError, build_form, clamp_rect,
    encode_under_budget, normalize, percent_decode_form_value, percent_encode_strict,
    strict_encoded_len, target_dimensions,
};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use proptest::prelude::*;

const BOUNDS: GeometryBounds = GeometryBounds {
    max_aspect: 3.0,
    min_short_side: 64,
    max_long_side: 4096,
};

// 缩小版约束：小尺寸输入即可触发裁剪、放大与缩小三条路径
const SMALL_BOUNDS: GeometryBounds = GeometryBounds {
    max_aspect: 3.0,
    min_short_side: 16,
    max_long_side: 256,
};

fn gray(width: u32, height: u32) -> RasterImage {
    let img = GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
    RasterImage::new(DynamicImage::ImageLuma8(img)).expect("valid test image")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn normalized_image_respects_aspect_and_bounds(width in 1u32..400, height in 1u32..400) {
        let out = normalize(gray(width, height), BOUNDS, FilterType::Triangle);
        let (w, h) = out.dimensions();
        let (short, long) = (w.min(h) as f64, w.max(h) as f64);

        prop_assert!(w >= 1 && h >= 1);
        prop_assert!(long <= 4096.0);
        // 取整误差最多 1 像素
        prop_assert!(long / short <= 3.0 + 1.0 / short + 1e-9);
        prop_assert!(short >= 64.0 || long >= 4095.0 || long / short > 3.0 - 1e-9);
    }

    #[test]
    fn normalize_is_idempotent_on_conforming_images(short in 64u32..300, factor in 1.0f64..3.0) {
        let long = ((short as f64) * factor).floor() as u32;
        let image = gray(long, short);
        let out = normalize(image, BOUNDS, FilterType::Triangle);
        prop_assert_eq!(out.dimensions(), (long, short));
    }

    #[test]
    fn normalize_output_is_a_fixed_point(width in 1u32..1200, height in 1u32..1200) {
        let first = normalize(gray(width, height), SMALL_BOUNDS, FilterType::Triangle);
        let dims = first.dimensions();
        let (short, long) = (dims.0.min(dims.1), dims.0.max(dims.1));
        prop_assert!(long <= 256);
        prop_assert!(long as f64 / short as f64 <= 3.0);

        let second = normalize(first, SMALL_BOUNDS, FilterType::Triangle);
        prop_assert_eq!(second.dimensions(), dims);
    }

    #[test]
    fn target_dimensions_never_exceed_long_side(width in 1u32..20_000, height in 1u32..20_000) {
        if let Some((w, h)) = target_dimensions(width, height, 64, 4096) {
            prop_assert!(w.max(h) <= 4096);
            prop_assert!(w >= 1 && h >= 1);
        }
    }

    #[test]
    fn strict_encoding_round_trips_base64(s in "[A-Za-z0-9+/]{0,200}={0,2}") {
        let encoded = percent_encode_strict(&s);
        prop_assert!(!encoded.contains('+'));
        prop_assert!(!encoded.contains('/'));
        prop_assert!(!encoded.contains('='));
        prop_assert_eq!(encoded.len(), strict_encoded_len(&s));
        prop_assert_eq!(percent_decode_form_value(&encoded).unwrap(), s);
    }

    #[test]
    fn form_body_length_matches_prediction(s in "[A-Za-z0-9+/]{1,200}") {
        let body = build_form(&s).unwrap();
        prop_assert_eq!(body.len(), "image=".len() + strict_encoded_len(&s));
    }

    #[test]
    fn encoder_never_exceeds_budget(seed in any::<u32>(), max_bytes in 200usize..6_000) {
        let img = image::RgbImage::from_fn(48, 48, |x, y| {
            let v = (x ^ seed).wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503));
            image::Rgb([(v >> 3) as u8, (v >> 11) as u8, (v >> 19) as u8])
        });
        let raster = RasterImage::new(DynamicImage::ImageRgb8(img)).unwrap();
        let budget = EncodeBudget {
            initial_quality: 0.9,
            min_quality: 0.2,
            quality_step: 0.1,
            max_bytes,
        };

        match encode_under_budget(&raster, budget) {
            Ok(attempt) => {
                prop_assert!(attempt.base64_len <= max_bytes);
                prop_assert!(attempt.form_len <= max_bytes);
                prop_assert_eq!(attempt.form_body().unwrap().len(), attempt.form_len);
            }
            Err(VisionError::BudgetExceeded { form_len, .. }) => prop_assert!(form_len > max_bytes),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn clamped_rect_stays_inside_image(
        left in -200i64..400,
        top in -200i64..400,
        width in -10i64..500,
        height in -10i64..500,
        image_w in 1u32..300,
        image_h in 1u32..300,
    ) {
        let rect = PixelRect { left, top, width, height };
        if let Ok(region) = clamp_rect(rect, image_w, image_h) {
            prop_assert!(region.width >= 1 && region.height >= 1);
            prop_assert!(region.x + region.width <= image_w);
            prop_assert!(region.y + region.height <= image_h);
        }
    }
}
