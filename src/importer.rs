//! The import resolver.
//!
//! [`SpriteImporter::resolve`] is called by the host for every `@import`.
//! Imports of `.png` globs run the full cycle: collect the images,
//! fingerprint them, check the cache and, on a miss, pack, compress, render
//! and write. Any other import is left to the host.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::cache::{self, Outputs};
use crate::collect::{self, ImageEntry, SpriteMap};
use crate::config::{Config, Options};
use crate::core::Hash32;
use crate::error::SpriteError;
use crate::io::{as_overhead, output_file};
use crate::pack::{self, Compressor, LayoutPacker, Packer, PngCompressor};
use crate::paths;
use crate::render;
use crate::selectors::partition;

/// Where the host finds the generated source for an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub file: Utf8PathBuf,
}

pub struct SpriteImporter {
    config: Config,
    packer: Arc<dyn Packer>,
    compressor: Arc<dyn Compressor>,
    /// Last non-partial stylesheet seen, relative URLs are computed from the
    /// CSS file it compiles to.
    root: RwLock<Option<Utf8PathBuf>>,
}

impl SpriteImporter {
    pub fn new(options: Options) -> Self {
        Self::with_config(Config::resolve(options))
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            packer: Arc::new(LayoutPacker),
            compressor: Arc::new(PngCompressor),
            root: RwLock::new(None),
        }
    }

    /// Replace the default [`LayoutPacker`].
    pub fn with_packer(mut self, packer: impl Packer + 'static) -> Self {
        self.packer = Arc::new(packer);
        self
    }

    /// Replace the default [`PngCompressor`].
    pub fn with_compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressor = Arc::new(compressor);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve one import found in the stylesheet at `prev`.
    ///
    /// Returns `None` for anything that isn't a `.png` import.
    pub fn resolve(&self, url: &str, prev: &Utf8Path) -> Result<Option<ImportResult>, SpriteError> {
        let root = self.track_root(prev);
        self.resolve_url(url, root.as_deref())
    }

    /// Resolve many imports, sprite maps are processed in parallel.
    ///
    /// Roots are tracked in input order, so every import sees the root it
    /// would have seen in a sequential run. Results are returned in input
    /// order.
    pub fn resolve_all(
        &self,
        imports: &[(&str, &Utf8Path)],
    ) -> Vec<Result<Option<ImportResult>, SpriteError>> {
        let imports: Vec<(&str, Option<Utf8PathBuf>)> = imports
            .iter()
            .map(|(url, prev)| (*url, self.track_root(prev)))
            .collect();

        imports
            .par_iter()
            .map(|(url, root)| self.resolve_url(url, root.as_deref()))
            .collect()
    }

    fn resolve_url(
        &self,
        url: &str,
        root: Option<&Utf8Path>,
    ) -> Result<Option<ImportResult>, SpriteError> {
        if !url.ends_with(".png") {
            return Ok(None);
        }

        debug!(self.config, "@import \"{}\"", url);
        self.process(url, root).map(Some)
    }

    /// Remember `prev` as the root stylesheet unless it is a partial.
    ///
    /// Returns the root in effect for an import found in `prev`.
    pub(crate) fn track_root(&self, prev: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        if !is_partial(prev) && root.as_deref() != Some(prev) {
            debug!(self.config, "find root: {}", prev);
            *root = Some(prev.to_owned());
        }

        root.clone()
    }

    fn process(&self, url: &str, root: Option<&Utf8Path>) -> Result<ImportResult, SpriteError> {
        let start = Instant::now();
        let config = &self.config;
        let css_dir = self.css_dir(root);

        let mut map = collect::collect(url, config)?;
        debug!(
            config,
            "collected {} images for {} (ratio {})",
            map.images.len(),
            map.stem(),
            map.pixel_ratio
        );

        let url_base = self.has_relative_urls().then_some(css_dir.as_str());
        let fp = cache::fingerprint(&map, config, url_base);
        debug!(config, "hash: {}", fp.key);

        let outputs = Outputs::new(&map, &fp.key, config);
        if cache::check_cache(&fp, &outputs, config) {
            debug!(config, "cache hit: {}", outputs.source);
            return Ok(ImportResult {
                file: outputs.source,
            });
        }

        cache::clear_stale(&map, config);

        if config.no_sprite {
            collect::read_dimensions(&mut map.images)?;

            let selectors = partition(&map.images);
            let source =
                render::render_no_sprite(&map, &selectors, |image| {
                self.image_url(&map, image, &css_dir)
            })?;

            cache::write_record(&outputs, &fp, None)?;
            output_file(&outputs.source, source)?;

            tracing::info!(
                "created no-sprite stylesheet {} ({} images) {}",
                map.name,
                map.images.len(),
                as_overhead(start)
            );
        } else {
            let (image, sheet) = pack::pack_map(&mut map, &*self.packer, &config.packing)?;
            debug!(config, "packed {}x{} sheet", sheet.width, sheet.height);

            let image = pack::compress_sheet(image, &*self.compressor, &config.compression)?;
            let image_hash = Hash32::hash(&image);

            output_file(&outputs.sheet, &image)?;
            cache::write_record(&outputs, &fp, Some(image_hash))?;

            let selectors = partition(&map.images);
            let sheet_url = self.sheet_url(&map, &fp.key, &css_dir);
            let source = render::render_sprite(&map, &selectors, &sheet, &fp.key, &sheet_url)?;
            output_file(&outputs.source, source)?;

            tracing::info!(
                "created sprite sheet {}#{} {}",
                config.project_relative(&outputs.sheet),
                fp.key,
                as_overhead(start)
            );
        }

        Ok(ImportResult {
            file: outputs.source,
        })
    }

    /// Public URL of the packed sheet written for cache key `key`.
    pub(crate) fn sheet_url(&self, map: &SpriteMap, key: &str, css_dir: &str) -> String {
        let dir = paths::join(&self.config.http_generated_images_path, &map.url_dir());
        let path = paths::join(&paths::dirname(&dir), &format!("{}-{key}.png", map.stem()));
        self.public_url(&path, css_dir)
    }

    /// Public URL of a single source image, used when nothing is packed.
    pub(crate) fn image_url(&self, map: &SpriteMap, image: &ImageEntry, css_dir: &str) -> String {
        let dir = paths::join(&self.config.http_generated_images_path, &map.url_dir());
        let path = paths::join(&dir, &format!("{}.png", image.basename));
        self.public_url(&path, css_dir)
    }

    /// Absolute paths get the base URI, relative paths are made relative to
    /// `css_dir`.
    fn public_url(&self, path: &str, css_dir: &str) -> String {
        if path.starts_with('/') {
            return format!("{}{}", self.config.base_uri, path);
        }

        paths::relative(css_dir, path)
    }

    fn has_relative_urls(&self) -> bool {
        !paths::normalize(&self.config.http_generated_images_path).starts_with('/')
    }

    /// Directory of the CSS file the root stylesheet compiles to.
    pub(crate) fn css_dir(&self, root: Option<&Utf8Path>) -> String {
        match root {
            Some(root) => {
                let root = paths::resolve(&self.config.project_path, root);
                let rel = paths::display_relative(&self.config.sass_path, &root);
                paths::dirname(&paths::join(&self.config.http_stylesheets_path, &rel))
            }
            None => paths::normalize(&self.config.http_stylesheets_path),
        }
    }
}

impl std::fmt::Debug for SpriteImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpriteImporter")
            .field("config", &self.config)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// A partial is any file whose name, or the name of any parent directory,
/// starts with `_`.
fn is_partial(path: &Utf8Path) -> bool {
    path.components().any(|part| part.as_str().starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(url: &str, name: &str, suffix: &str) -> SpriteMap {
        SpriteMap {
            url: url.into(),
            name: name.into(),
            pixel_ratio: 1,
            suffix: suffix.into(),
            images: vec![],
        }
    }

    fn image(basename: &str) -> ImageEntry {
        ImageEntry {
            path: format!("/p/images/icons/{basename}.png").into(),
            basename: basename.into(),
            name: basename.into(),
            digest: Hash32::default(),
            rect: Default::default(),
        }
    }

    #[test]
    fn test_is_partial() {
        assert!(is_partial(Utf8Path::new("/p/sass/_icons.scss")));
        assert!(is_partial(Utf8Path::new("/p/sass/_lib/icons.scss")));
        assert!(!is_partial(Utf8Path::new("/p/sass/main.scss")));
        assert!(!is_partial(Utf8Path::new("/p/sass/my_main.scss")));
    }

    #[test]
    fn test_absolute_urls() {
        let importer = SpriteImporter::new(Options::default().project_path("/p"));
        let css_dir = importer.css_dir(None);

        assert_eq!(
            importer.sheet_url(&map("icons/*.png", "icons", ""), "abc1234", &css_dir),
            "/images/icons-abc1234.png"
        );
        assert_eq!(
            importer.sheet_url(&map("ui/icons@2x/*.png", "icons", "@2x"), "abc1234", &css_dir),
            "/images/ui/icons@2x-abc1234.png"
        );
        assert_eq!(
            importer.image_url(&map("icons/*.png", "icons", ""), &image("a"), &css_dir),
            "/images/icons/a.png"
        );
        assert!(!importer.has_relative_urls());
    }

    #[test]
    fn test_base_uri_prefix() {
        let importer = SpriteImporter::new(
            Options::default()
                .project_path("/p")
                .base_uri("https://cdn.example.com"),
        );

        assert_eq!(
            importer.sheet_url(&map("icons/*.png", "icons", ""), "abc1234", "/css"),
            "https://cdn.example.com/images/icons-abc1234.png"
        );
    }

    #[test]
    fn test_relative_urls_follow_root_stylesheet() {
        let importer = SpriteImporter::new(
            Options::default()
                .project_path("/p")
                .http_stylesheets_path("css")
                .http_generated_images_path("images"),
        );
        let icons = map("icons/*.png", "icons", "");
        let url = |root: Option<Utf8PathBuf>| {
            importer.sheet_url(&icons, "abc1234", &importer.css_dir(root.as_deref()))
        };

        assert!(importer.has_relative_urls());
        assert_eq!(url(None), "../images/icons-abc1234.png");

        let root = importer.track_root(Utf8Path::new("/p/sass/main.scss"));
        assert_eq!(url(root), "../images/icons-abc1234.png");

        let root = importer.track_root(Utf8Path::new("/p/sass/pages/about.scss"));
        assert_eq!(url(root), "../../images/icons-abc1234.png");

        let root = importer.track_root(Utf8Path::new("/p/sass/pages/_partial.scss"));
        assert_eq!(root.as_deref(), Some(Utf8Path::new("/p/sass/pages/about.scss")));
        assert_eq!(url(root), "../../images/icons-abc1234.png");
    }

    #[test]
    fn test_non_png_imports_are_ignored() {
        let importer = SpriteImporter::new(Options::default().project_path("/p"));

        let result = importer.resolve("variables", Utf8Path::new("/p/sass/main.scss"));
        assert!(matches!(result, Ok(None)));

        let result = importer.resolve("icons/*.svg", Utf8Path::new("/p/sass/main.scss"));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_import_without_directory() {
        let importer = SpriteImporter::new(Options::default().project_path("/p"));

        let result = importer.resolve("*.png", Utf8Path::new("/p/sass/main.scss"));
        assert!(matches!(result, Err(SpriteError::Import(_))));
    }
}
