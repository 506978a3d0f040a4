//! Snapping image sizes to the resolutions a model family was trained on.

/// One officially supported aspect ratio and its resolution (landscape).
struct Bucket {
    ratio: f64,
    width: u32,
    height: u32,
}

const fn bucket(ratio: f64, width: u32, height: u32) -> Bucket {
    Bucket {
        ratio,
        width,
        height,
    }
}

const SD15_BUCKETS: &[Bucket] = &[
    bucket(1.0, 512, 512),
    bucket(1.25, 640, 512),
    bucket(1.5, 768, 512),
    bucket(1.75, 896, 512),
];

/// Square SD 1.5 images are commonly generated at several sizes.
const SD15_SQUARE_SIZES: &[u32] = &[512, 640, 768];

const SD21_BUCKETS: &[Bucket] = &[
    bucket(1.0, 768, 768),
    bucket(1.1667, 896, 768),
    bucket(1.3333, 1024, 768),
    bucket(1.5, 1152, 768),
    bucket(1.6667, 1280, 768),
];

/// SDXL and derivatives.
const DEFAULT_BUCKETS: &[Bucket] = &[
    bucket(1.0, 1024, 1024),
    bucket(1.2857, 1152, 896),
    bucket(1.4615, 1216, 832),
    bucket(1.75, 1344, 768),
    bucket(2.4, 1536, 640),
];

/// Model family a base-model label belongs to, for resolution purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Sd15,
    Sd21,
    Default,
}

impl Family {
    pub fn from_base_model(base_model: &str) -> Self {
        let base = base_model.trim().to_lowercase();
        if base.starts_with("sd 1.5") {
            Family::Sd15
        } else if base.starts_with("sd 2.1") {
            Family::Sd21
        } else {
            Family::Default
        }
    }

    fn buckets(&self) -> &'static [Bucket] {
        match self {
            Family::Sd15 => SD15_BUCKETS,
            Family::Sd21 => SD21_BUCKETS,
            Family::Default => DEFAULT_BUCKETS,
        }
    }
}

/// Nearest supported resolution for `width` x `height`.
///
/// The aspect ratio (long side over short side) picks the closest bucket,
/// ties going to the earlier one; the result is flipped back to portrait
/// when `height` was the longer side. Zero dimensions are returned unchanged.
pub fn snap_resolution(width: u32, height: u32, family: Family) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let portrait = height > width;
    let (long, short) = if portrait { (height, width) } else { (width, height) };
    let ratio = f64::from(long) / f64::from(short);

    let buckets = family.buckets();
    let nearest = buckets
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (a.ratio - ratio)
                .abs()
                .total_cmp(&(b.ratio - ratio).abs())
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    let (w, h) = if family == Family::Sd15 && nearest == 0 {
        let size = SD15_SQUARE_SIZES
            .iter()
            .copied()
            .min_by_key(|s| s.abs_diff(width))
            .unwrap_or(512);
        (size, size)
    } else {
        (buckets[nearest].width, buckets[nearest].height)
    };

    if portrait {
        (h, w)
    } else {
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_family() {
        assert_eq!(snap_resolution(1000, 1000, Family::Default), (1024, 1024));
        assert_eq!(snap_resolution(1800, 1000, Family::Default), (1344, 768));
        assert_eq!(snap_resolution(1000, 1800, Family::Default), (768, 1344));
        assert_eq!(snap_resolution(832, 1216, Family::Default), (832, 1216));
    }

    #[test]
    fn test_sd15_square_sizes() {
        assert_eq!(snap_resolution(500, 500, Family::Sd15), (512, 512));
        assert_eq!(snap_resolution(700, 690, Family::Sd15), (640, 640));
        assert_eq!(snap_resolution(760, 768, Family::Sd15), (768, 768));
        assert_eq!(snap_resolution(512, 768, Family::Sd15), (512, 768));
    }

    #[test]
    fn test_sd21() {
        assert_eq!(snap_resolution(1280, 760, Family::Sd21), (1280, 768));
        assert_eq!(snap_resolution(768, 1024, Family::Sd21), (768, 1024));
    }

    #[test]
    fn test_zero_unchanged() {
        assert_eq!(snap_resolution(0, 512, Family::Default), (0, 512));
    }

    #[test]
    fn test_family_from_base_model() {
        assert_eq!(Family::from_base_model(" SD 1.5 LCM"), Family::Sd15);
        assert_eq!(Family::from_base_model("SD 2.1 768"), Family::Sd21);
        assert_eq!(Family::from_base_model("Pony"), Family::Default);
        assert_eq!(Family::from_base_model(""), Family::Default);
    }
}
