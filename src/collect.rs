//! Image set discovery.
//!
//! An import such as `icons/*.png` is resolved against the images directory
//! and globbed. All matches form one [`SpriteMap`] named after their
//! directory. A directory carrying a retina marker (`icons@2x/`) produces a
//! map with that pixel ratio; in a plain directory, files carrying a marker
//! are left out because they belong to a high density sheet of their own.

use camino::{Utf8Path, Utf8PathBuf};
use glob::{Pattern, glob};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::config::Config;
use crate::core::Hash32;
use crate::error::{CollectError, SpriteError};
use crate::pack::Rect;
use crate::paths;

/// One source PNG.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    /// Absolute path to the file.
    pub path: Utf8PathBuf,
    /// File name without the `.png` extension.
    pub basename: String,
    /// Basename with the retina marker removed.
    pub name: String,
    /// Digest of the file contents.
    pub digest: Hash32,
    /// Placement on the sheet, filled in after packing.
    pub rect: Rect,
}

/// The images that end up on one sprite sheet.
#[derive(Debug, Clone)]
pub struct SpriteMap {
    /// The import URL this map was collected for, normalised and relative
    /// to the images directory.
    pub url: String,
    /// Directory name with the retina marker removed.
    pub name: String,
    /// Density multiplier, 1 for regular sheets.
    pub pixel_ratio: u32,
    /// Raw retina marker of the directory, empty when there is none.
    pub suffix: String,
    /// Images in glob order.
    pub images: Vec<ImageEntry>,
}

impl SpriteMap {
    /// `<name><suffix>`, the stem shared by the sheet and cache files.
    pub fn stem(&self) -> String {
        format!("{}{}", self.name, self.suffix)
    }

    /// Directory portion of the import URL, e.g. `icons` for `icons/*.png`.
    pub fn url_dir(&self) -> String {
        paths::dirname(&self.url)
    }
}

/// Name, pixel ratio and suffix of the map behind an import URL.
pub(crate) fn map_identity(url: &str, config: &Config) -> Result<(String, u32, String), SpriteError> {
    let dir = paths::dirname(url);
    let dir_name = match dir.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name,
        _ => return Err(SpriteError::Import(url.to_string())),
    };

    let name = config.retina_mark.strip(dir_name).into_owned();
    if name.is_empty() {
        return Err(SpriteError::Import(url.to_string()));
    }

    let (pixel_ratio, suffix) = config
        .retina_mark
        .parse(dir_name)
        .unwrap_or_else(|| (1, String::new()));

    Ok((name, pixel_ratio, suffix))
}

/// Import URLs are always relative to the images directory, a leading `/`
/// is dropped.
pub(crate) fn normalize_url(url: &str) -> String {
    paths::normalize(url.trim_start_matches(['/', '\\']))
}

/// Glob the images behind `url` and build the sprite map.
///
/// An empty match list is not an error. Every matched file is read once to
/// compute its digest.
pub fn collect(url: &str, config: &Config) -> Result<SpriteMap, SpriteError> {
    let url = normalize_url(url);
    let (name, pixel_ratio, suffix) = map_identity(&url, config)?;

    let base = Pattern::escape(config.images_path.as_str());
    let pattern = format!("{}/{}", base.trim_end_matches('/'), url);

    let mut paths = Vec::new();
    for path in glob(&pattern).map_err(CollectError::from)? {
        let path = path.map_err(CollectError::from)?;
        let path = Utf8PathBuf::try_from(path).map_err(CollectError::from)?;
        if path.is_file() {
            paths.push(path);
        }
    }

    let images: Vec<ImageEntry> = paths
        .into_par_iter()
        .map(|path| read_entry(path, config))
        .collect::<Result<_, _>>()?;

    let images = match pixel_ratio {
        1 => images
            .into_iter()
            .filter(|image| image.name == image.basename)
            .collect(),
        _ => images,
    };

    Ok(SpriteMap {
        url,
        name,
        pixel_ratio,
        suffix,
        images,
    })
}

fn read_entry(path: Utf8PathBuf, config: &Config) -> Result<ImageEntry, CollectError> {
    let digest = Hash32::hash_file(&path).map_err(|e| CollectError::Io(path.clone(), e))?;
    let basename = stem(&path);
    let name = config.retina_mark.strip(&basename).into_owned();

    Ok(ImageEntry {
        path,
        basename,
        name,
        digest,
        rect: Rect::default(),
    })
}

fn stem(path: &Utf8Path) -> String {
    let file = path.file_name().unwrap_or_default();
    file.strip_suffix(".png").unwrap_or(file).to_string()
}

/// Read the pixel size of every image, used when no sheet is packed.
pub(crate) fn read_dimensions(images: &mut [ImageEntry]) -> Result<(), CollectError> {
    let sizes: Vec<(u32, u32)> = images
        .iter()
        .map(|image| image.path.as_path())
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|path| {
            image::image_dimensions(path).map_err(|e| CollectError::Dimensions(path.to_owned(), e))
        })
        .collect::<Result<_, _>>()?;

    for (image, (width, height)) in images.iter_mut().zip(sizes) {
        image.rect = Rect {
            x: 0,
            y: 0,
            width,
            height,
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use std::fs;

    fn project() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let config = Config::resolve(Options::default().project_path(root));
        (dir, config)
    }

    fn touch(config: &Config, rel: &str, bytes: &[u8]) {
        let path = config.images_path.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_map_identity() {
        let config = Config::default();

        assert_eq!(
            map_identity("icons/*.png", &config).unwrap(),
            ("icons".to_string(), 1, String::new())
        );
        assert_eq!(
            map_identity("ui/icons@2x/*.png", &config).unwrap(),
            ("icons".to_string(), 2, "@2x".to_string())
        );
        assert!(matches!(
            map_identity("*.png", &config),
            Err(SpriteError::Import(_))
        ));
    }

    #[test]
    fn test_collect_filters_retina_files_from_plain_map() {
        let (_guard, config) = project();
        touch(&config, "icons/b.png", b"b");
        touch(&config, "icons/a.png", b"a");
        touch(&config, "icons/a@2x.png", b"a2");
        touch(&config, "icons/notes.txt", b"x");

        let map = collect("icons/*.png", &config).unwrap();

        assert_eq!(map.name, "icons");
        assert_eq!(map.pixel_ratio, 1);
        assert_eq!(map.suffix, "");
        let names: Vec<_> = map.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(map.images[0].path.is_absolute());
    }

    #[test]
    fn test_collect_keeps_everything_in_retina_directory() {
        let (_guard, config) = project();
        touch(&config, "icons@2x/a@2x.png", b"a");
        touch(&config, "icons@2x/b.png", b"b");

        let map = collect("icons@2x/*.png", &config).unwrap();

        assert_eq!(map.name, "icons");
        assert_eq!(map.pixel_ratio, 2);
        assert_eq!(map.suffix, "@2x");
        assert_eq!(map.stem(), "icons@2x");
        let pairs: Vec<_> = map
            .images
            .iter()
            .map(|i| (i.basename.as_str(), i.name.as_str()))
            .collect();
        assert_eq!(pairs, [("a@2x", "a"), ("b", "b")]);
    }

    #[test]
    fn test_collect_normalizes_url() {
        let (_guard, config) = project();
        touch(&config, "icons/a.png", b"a");

        let map = collect("/icons/./*.png", &config).unwrap();

        assert_eq!(map.url, "icons/*.png");
        assert_eq!(map.url_dir(), "icons");
        assert_eq!(map.images.len(), 1);
    }

    #[test]
    fn test_collect_empty_directory() {
        let (_guard, config) = project();

        let map = collect("missing/*.png", &config).unwrap();

        assert_eq!(map.name, "missing");
        assert!(map.images.is_empty());
    }

    #[test]
    fn test_digest_follows_content() {
        let (_guard, config) = project();
        touch(&config, "icons/a.png", b"one");
        let first = collect("icons/*.png", &config).unwrap().images[0].digest;

        touch(&config, "icons/a.png", b"two");
        let second = collect("icons/*.png", &config).unwrap().images[0].digest;

        assert_ne!(first, second);
    }
}
