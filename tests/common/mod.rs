#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use image::{Rgba, RgbaImage};
use magic_sprites::{
    CompressionParams, Compressor, Layout, Options, PackedSheet, Packer, PackingParams,
};

/// A throwaway project tree, removed on drop.
pub struct Project {
    _dir: tempfile::TempDir,
    pub root: Utf8PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        Self { _dir: dir, root }
    }

    /// Options pointing every directory into the project.
    pub fn options(&self) -> Options {
        Options::default()
            .project_path(self.root.clone())
            .cache_dir(self.root.join(".sprites"))
            .packing(PackingParams {
                algorithm: Layout::LeftRight,
                padding: 0,
            })
    }

    /// Write a solid colour PNG under `images/`.
    pub fn png(&self, rel: &str, width: u32, height: u32, color: [u8; 4]) -> Utf8PathBuf {
        let path = self.root.join("images").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(width, height, Rgba(color))
            .save(&path)
            .unwrap();
        path
    }

    pub fn write(&self, rel: &str, text: &str) -> Utf8PathBuf {
        let path = self.root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    pub fn main_scss(&self) -> Utf8PathBuf {
        self.root.join("sass/main.scss")
    }

    pub fn read(&self, path: &Utf8Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}

/// Wraps a service and counts how often it is called.
#[derive(Clone)]
pub struct Counting<T> {
    inner: T,
    pub calls: Arc<AtomicUsize>,
}

impl<T> Counting<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T: Packer> Packer for Counting<T> {
    fn pack(&self, files: &[Utf8PathBuf], params: &PackingParams) -> anyhow::Result<PackedSheet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.pack(files, params)
    }
}

impl<T: Compressor> Compressor for Counting<T> {
    fn compress(&self, image: Vec<u8>, params: &CompressionParams) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compress(image, params)
    }
}

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
