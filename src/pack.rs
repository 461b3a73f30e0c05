//! Sheet packing and compression.
//!
//! Both steps are services behind the [`Packer`] and [`Compressor`] traits.
//! The orchestration here only marshals parameters in and coordinates out.
//! [`LayoutPacker`] and [`PngCompressor`] are the in-process defaults.

use std::collections::HashMap;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;

use crate::collect::SpriteMap;
use crate::config::{CompressionLevel, CompressionParams, Layout, PackingParams};
use crate::error::SpriteError;

/// Placement of one image within a sheet, in sheet pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Output of a packing service.
#[derive(Debug, Clone)]
pub struct PackedSheet {
    /// Encoded sheet image.
    pub image: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Placement of every input file, keyed by the path it was given as.
    pub coordinates: HashMap<Utf8PathBuf, Rect>,
}

/// Sheet level data needed by the stylesheet generator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SheetMetadata {
    pub width: u32,
    pub height: u32,
}

/// Combines a list of image files into one sheet.
pub trait Packer: Send + Sync {
    fn pack(&self, files: &[Utf8PathBuf], params: &PackingParams) -> anyhow::Result<PackedSheet>;
}

/// Shrinks an encoded sheet image.
pub trait Compressor: Send + Sync {
    fn compress(&self, image: Vec<u8>, params: &CompressionParams) -> anyhow::Result<Vec<u8>>;
}

/// Pack the images of `map` and attach the returned rectangles to them.
///
/// Returns the encoded sheet together with its dimensions.
pub fn pack_map(
    map: &mut SpriteMap,
    packer: &dyn Packer,
    params: &PackingParams,
) -> Result<(Vec<u8>, SheetMetadata), SpriteError> {
    let files: Vec<Utf8PathBuf> = map.images.iter().map(|image| image.path.clone()).collect();

    let sheet = packer.pack(&files, params).map_err(SpriteError::Pack)?;

    for image in &mut map.images {
        image.rect = *sheet.coordinates.get(&image.path).ok_or_else(|| {
            SpriteError::Pack(anyhow::anyhow!("packer returned no placement for {}", image.path))
        })?;
    }

    let metadata = SheetMetadata {
        width: sheet.width,
        height: sheet.height,
    };

    Ok((sheet.image, metadata))
}

pub fn compress_sheet(
    image: Vec<u8>,
    compressor: &dyn Compressor,
    params: &CompressionParams,
) -> Result<Vec<u8>, SpriteError> {
    compressor.compress(image, params).map_err(SpriteError::Compress)
}

// ******************************
// *      Default services      *
// ******************************

/// Packs PNG files with the layout named in [`PackingParams`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LayoutPacker;

impl Packer for LayoutPacker {
    fn pack(&self, files: &[Utf8PathBuf], params: &PackingParams) -> anyhow::Result<PackedSheet> {
        anyhow::ensure!(!files.is_empty(), "no images to pack");

        let images = files
            .par_iter()
            .map(|path| decode(path))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let sizes: Vec<(u32, u32)> = images.iter().map(|image| image.dimensions()).collect();
        let positions = layout(&sizes, params);

        let width = positions
            .iter()
            .zip(&sizes)
            .map(|(&(x, _), &(w, _))| x + w)
            .max()
            .unwrap_or(0);
        let height = positions
            .iter()
            .zip(&sizes)
            .map(|(&(_, y), &(_, h))| y + h)
            .max()
            .unwrap_or(0);

        let mut sheet = RgbaImage::new(width, height);
        let mut coordinates = HashMap::with_capacity(files.len());

        for ((path, image), &(x, y)) in files.iter().zip(&images).zip(&positions) {
            image::imageops::replace(&mut sheet, image, i64::from(x), i64::from(y));
            coordinates.insert(
                path.clone(),
                Rect {
                    x,
                    y,
                    width: image.width(),
                    height: image.height(),
                },
            );
        }

        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer).write_image(
            sheet.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        )?;

        Ok(PackedSheet {
            image: buffer,
            width,
            height,
            coordinates,
        })
    }
}

fn decode(path: &Utf8Path) -> anyhow::Result<RgbaImage> {
    let image = image::open(path).with_context(|| format!("Couldn't decode image {path}"))?;
    Ok(image.to_rgba8())
}

/// Top left corner for every size, in input order.
fn layout(sizes: &[(u32, u32)], params: &PackingParams) -> Vec<(u32, u32)> {
    let pad = params.padding;

    match params.algorithm {
        Layout::TopDown => {
            let mut y = 0;
            sizes
                .iter()
                .map(|&(_, h)| {
                    let at = (0, y);
                    y += h + pad;
                    at
                })
                .collect()
        }
        Layout::LeftRight => {
            let mut x = 0;
            sizes
                .iter()
                .map(|&(w, _)| {
                    let at = (x, 0);
                    x += w + pad;
                    at
                })
                .collect()
        }
        Layout::BinaryTree => {
            let padded: Vec<_> = sizes.iter().map(|&(w, h)| (w + pad, h + pad)).collect();
            GrowingPacker::fit(&padded)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    right: Option<usize>,
    down: Option<usize>,
}

impl Node {
    fn free(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            used: false,
            right: None,
            down: None,
        }
    }
}

/// Binary tree packer whose root grows right or down as blocks arrive.
///
/// Blocks are placed largest side first, which keeps the sheet close to
/// square.
struct GrowingPacker {
    nodes: Vec<Node>,
    root: usize,
}

impl GrowingPacker {
    fn fit(sizes: &[(u32, u32)]) -> Vec<(u32, u32)> {
        let mut order: Vec<usize> = (0..sizes.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(sizes[i].0.max(sizes[i].1)));

        let mut positions = vec![(0, 0); sizes.len()];
        let Some(&first) = order.first() else {
            return positions;
        };

        let (w, h) = sizes[first];
        let mut packer = GrowingPacker {
            nodes: vec![Node::free(0, 0, w, h)],
            root: 0,
        };

        for i in order {
            let (w, h) = sizes[i];
            positions[i] = match packer.find(packer.root, w, h) {
                Some(node) => packer.split(node, w, h),
                None => packer.grow(w, h),
            };
        }

        positions
    }

    fn find(&self, index: usize, w: u32, h: u32) -> Option<usize> {
        let node = self.nodes[index];
        if node.used {
            node.right
                .and_then(|right| self.find(right, w, h))
                .or_else(|| node.down.and_then(|down| self.find(down, w, h)))
        } else if w <= node.w && h <= node.h {
            Some(index)
        } else {
            None
        }
    }

    fn split(&mut self, index: usize, w: u32, h: u32) -> (u32, u32) {
        let node = self.nodes[index];
        let down = self.push(Node::free(node.x, node.y + h, node.w, node.h - h));
        let right = self.push(Node::free(node.x + w, node.y, node.w - w, h));

        let node = &mut self.nodes[index];
        node.used = true;
        node.down = Some(down);
        node.right = Some(right);

        (node.x, node.y)
    }

    fn grow(&mut self, w: u32, h: u32) -> (u32, u32) {
        let root = self.nodes[self.root];

        let can_grow_down = w <= root.w;
        let can_grow_right = h <= root.h;
        let should_grow_right = can_grow_right && root.h >= root.w + w;
        let should_grow_down = can_grow_down && root.w >= root.h + h;

        if should_grow_right {
            self.grow_right(w, h)
        } else if should_grow_down {
            self.grow_down(w, h)
        } else if can_grow_right {
            self.grow_right(w, h)
        } else if can_grow_down {
            self.grow_down(w, h)
        } else {
            self.grow_right(w, h)
        }
    }

    fn grow_right(&mut self, w: u32, h: u32) -> (u32, u32) {
        let old_root = self.root;
        let old = self.nodes[old_root];
        let height = old.h.max(h);
        let right = self.push(Node::free(old.w, 0, w, height));

        self.root = self.push(Node {
            x: 0,
            y: 0,
            w: old.w + w,
            h: height,
            used: true,
            right: Some(right),
            down: Some(old_root),
        });

        self.split(right, w, h)
    }

    fn grow_down(&mut self, w: u32, h: u32) -> (u32, u32) {
        let old_root = self.root;
        let old = self.nodes[old_root];
        let width = old.w.max(w);
        let down = self.push(Node::free(0, old.h, width, h));

        self.root = self.push(Node {
            x: 0,
            y: 0,
            w: width,
            h: old.h + h,
            used: true,
            right: Some(old_root),
            down: Some(down),
        });

        self.split(down, w, h)
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

/// Re-encodes PNG sheets losslessly at the configured compression level.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngCompressor;

impl Compressor for PngCompressor {
    fn compress(&self, image: Vec<u8>, params: &CompressionParams) -> anyhow::Result<Vec<u8>> {
        let decoded = image::load_from_memory_with_format(&image, image::ImageFormat::Png)
            .context("Couldn't decode sprite sheet")?;

        let compression = match params.level {
            CompressionLevel::Fast => CompressionType::Fast,
            CompressionLevel::Default => CompressionType::Default,
            CompressionLevel::Best => CompressionType::Best,
        };

        let mut out = Vec::new();
        let encoder = PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive);
        decoded.write_with_encoder(encoder)?;

        match out.len() < image.len() {
            true => Ok(out),
            false => Ok(image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::ImageEntry;
    use crate::core::Hash32;
    use image::Rgba;

    fn overlaps(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> bool {
        let (x1, y1, w1, h1) = a;
        let (x2, y2, w2, h2) = b;
        x1 < x2 + w2 && x1 + w1 > x2 && y1 < y2 + h2 && y1 + h1 > y2
    }

    fn params(algorithm: Layout, padding: u32) -> PackingParams {
        PackingParams { algorithm, padding }
    }

    #[test]
    fn test_strip_layouts() {
        let sizes = [(10, 10), (20, 5)];

        assert_eq!(layout(&sizes, &params(Layout::LeftRight, 0)), [(0, 0), (10, 0)]);
        assert_eq!(layout(&sizes, &params(Layout::TopDown, 0)), [(0, 0), (0, 10)]);
        assert_eq!(layout(&sizes, &params(Layout::TopDown, 3)), [(0, 0), (0, 13)]);
    }

    #[test]
    fn test_binary_tree_has_no_overlap() {
        let sizes = [(10, 10), (20, 10), (5, 30), (7, 7), (16, 4), (1, 1)];
        let positions = layout(&sizes, &params(Layout::BinaryTree, 0));

        let rects: Vec<_> = positions
            .iter()
            .zip(&sizes)
            .map(|(&(x, y), &(w, h))| (x, y, w, h))
            .collect();

        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(!overlaps(rects[i], rects[j]), "{:?} and {:?}", rects[i], rects[j]);
            }
        }
    }

    #[test]
    fn test_binary_tree_grows_down_for_wide_blocks() {
        let positions = layout(&[(10, 10), (20, 10)], &params(Layout::BinaryTree, 0));
        assert_eq!(positions, [(0, 10), (0, 0)]);
    }

    #[test]
    fn test_binary_tree_padding() {
        let positions = layout(&[(8, 8), (8, 8)], &params(Layout::BinaryTree, 2));
        let (a, b) = (positions[0], positions[1]);
        let gap = a.0.abs_diff(b.0).max(a.1.abs_diff(b.1));
        assert!(gap >= 10);
    }

    struct FixedPacker;

    impl Packer for FixedPacker {
        fn pack(&self, files: &[Utf8PathBuf], _: &PackingParams) -> anyhow::Result<PackedSheet> {
            let coordinates = files
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    let rect = Rect {
                        x: i as u32 * 10,
                        y: 0,
                        width: 10,
                        height: 10,
                    };
                    (path.clone(), rect)
                })
                .collect();

            Ok(PackedSheet {
                image: vec![1, 2, 3],
                width: files.len() as u32 * 10,
                height: 10,
                coordinates,
            })
        }
    }

    fn entry(path: &str) -> ImageEntry {
        ImageEntry {
            path: path.into(),
            basename: "x".into(),
            name: "x".into(),
            digest: Hash32::default(),
            rect: Rect::default(),
        }
    }

    fn map(paths: &[&str]) -> SpriteMap {
        SpriteMap {
            url: "icons/*.png".into(),
            name: "icons".into(),
            pixel_ratio: 1,
            suffix: String::new(),
            images: paths.iter().map(|p| entry(p)).collect(),
        }
    }

    #[test]
    fn test_pack_map_attaches_rects() {
        let mut map = map(&["/a.png", "/b.png"]);

        let (image, meta) = pack_map(&mut map, &FixedPacker, &PackingParams::default()).unwrap();

        assert_eq!(image, [1, 2, 3]);
        assert_eq!(meta, SheetMetadata { width: 20, height: 10 });
        assert_eq!(map.images[1].rect.x, 10);
    }

    #[test]
    fn test_pack_map_missing_placement_is_error() {
        struct Forgetful;

        impl Packer for Forgetful {
            fn pack(&self, _: &[Utf8PathBuf], _: &PackingParams) -> anyhow::Result<PackedSheet> {
                Ok(PackedSheet {
                    image: vec![],
                    width: 0,
                    height: 0,
                    coordinates: HashMap::new(),
                })
            }
        }

        let mut map = map(&["/a.png"]);
        let err = pack_map(&mut map, &Forgetful, &PackingParams::default()).unwrap_err();
        assert!(matches!(err, SpriteError::Pack(_)));
    }

    #[test]
    fn test_layout_packer_composes_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let red = Rgba([255, 0, 0, 255]);
        let blue = Rgba([0, 0, 255, 255]);

        let a = root.join("a.png");
        let b = root.join("b.png");
        RgbaImage::from_pixel(10, 10, red).save(&a).unwrap();
        RgbaImage::from_pixel(20, 10, blue).save(&b).unwrap();

        let sheet = LayoutPacker
            .pack(&[a.clone(), b.clone()], &params(Layout::LeftRight, 0))
            .unwrap();

        assert_eq!((sheet.width, sheet.height), (30, 10));
        assert_eq!(sheet.coordinates[&b], Rect { x: 10, y: 0, width: 20, height: 10 });

        let decoded = image::load_from_memory(&sheet.image).unwrap().to_rgba8();
        assert_eq!(*decoded.get_pixel(0, 0), red);
        assert_eq!(*decoded.get_pixel(29, 9), blue);
    }

    #[test]
    fn test_layout_packer_rejects_empty_input() {
        assert!(LayoutPacker.pack(&[], &PackingParams::default()).is_err());
    }

    #[test]
    fn test_png_compressor_keeps_pixels() {
        let image = RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 255]));
        let mut buffer = Vec::new();
        PngEncoder::new_with_quality(&mut buffer, CompressionType::Fast, FilterType::NoFilter)
            .write_image(image.as_raw(), 16, 16, ExtendedColorType::Rgba8)
            .unwrap();

        let out = PngCompressor
            .compress(buffer.clone(), &CompressionParams::default())
            .unwrap();

        assert!(out.len() <= buffer.len());
        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_png_compressor_rejects_garbage() {
        let err = compress_sheet(vec![0, 1, 2], &PngCompressor, &CompressionParams::default());
        assert!(matches!(err, Err(SpriteError::Compress(_))));
    }
}
