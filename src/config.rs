//! Plugin configuration.
//!
//! Configuration is built in two phases. [`Options`] holds whatever the user
//! supplied, every field optional. [`Config::resolve`] first merges the
//! options with defaults, then derives the absolute file system paths and web
//! paths from the merged values. The result is immutable.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RetinaMarkError;
use crate::paths;

const DEFAULT_RETINA_MARK: &str = r"@(\d+)x$";
const DEFAULT_CACHE_DIR: &str = "magic-sprites";

/// Pattern recognising the pixel ratio marker at the end of a file or
/// directory name, e.g. `icon@2x`.
///
/// The first capture group must hold the ratio digits.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct RetinaMark(Regex);

impl RetinaMark {
    pub fn new(pattern: &str) -> Result<Self, RetinaMarkError> {
        Ok(Self(Regex::new(pattern)?))
    }

    /// Remove the marker from a name, `icon@2x` becomes `icon`.
    pub fn strip<'a>(&self, name: &'a str) -> std::borrow::Cow<'a, str> {
        self.0.replace(name, "")
    }

    /// Returns the pixel ratio and the raw marker text if the name carries
    /// a marker with a parsable ratio.
    pub fn parse(&self, name: &str) -> Option<(u32, String)> {
        let captures = self.0.captures(name)?;
        let ratio = captures.get(1)?.as_str().parse::<u32>().ok()?;
        let suffix = captures.get(0)?.as_str().to_string();

        match ratio {
            0 => None,
            ratio => Some((ratio, suffix)),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for RetinaMark {
    fn default() -> Self {
        Self(Regex::new(DEFAULT_RETINA_MARK).expect("default retina mark is valid"))
    }
}

impl TryFrom<String> for RetinaMark {
    type Error = RetinaMarkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl Serialize for RetinaMark {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Strategy used by the default packer to lay out images on the sheet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// Growing binary tree, largest images first.
    #[default]
    BinaryTree,
    /// A single column.
    TopDown,
    /// A single row.
    LeftRight,
}

/// Parameters handed to the packing service.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingParams {
    pub algorithm: Layout,
    /// Transparent gap between neighbouring images in pixels.
    pub padding: u32,
}

/// PNG compression effort.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionLevel {
    Fast,
    Default,
    #[default]
    Best,
}

/// Parameters handed to the compression service.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionParams {
    pub level: CompressionLevel,
}

/// User supplied options. Anything left as `None` falls back to a default.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    pub project_path: Option<Utf8PathBuf>,
    pub base_uri: Option<String>,
    pub http_path: Option<String>,
    pub sass_dir: Option<Utf8PathBuf>,
    pub css_dir: Option<String>,
    pub images_dir: Option<Utf8PathBuf>,
    pub generated_images_dir: Option<Utf8PathBuf>,
    pub http_stylesheets_path: Option<String>,
    pub http_generated_images_path: Option<String>,
    pub retina_mark: Option<RetinaMark>,
    pub use_cache: Option<bool>,
    pub cache_dir: Option<Utf8PathBuf>,
    pub packing: Option<PackingParams>,
    pub compression: Option<CompressionParams>,
    pub no_sprite: Option<bool>,
    pub debug: Option<bool>,
}

macro_rules! setter {
    ($(#[$doc:meta])* $name:ident: $ty:ty) => {
        $(#[$doc])*
        pub fn $name(mut self, value: impl Into<$ty>) -> Self {
            self.$name = Some(value.into());
            self
        }
    };
}

impl Options {
    setter!(
        /// Base for every relative path, defaults to the working directory.
        project_path: Utf8PathBuf
    );
    setter!(
        /// Prefix for absolute generated asset URLs.
        base_uri: String
    );
    setter!(http_path: String);
    setter!(sass_dir: Utf8PathBuf);
    setter!(css_dir: String);
    setter!(
        /// Directory searched for sprite images.
        images_dir: Utf8PathBuf
    );
    setter!(
        /// Directory receiving generated sheets, defaults to `images_dir`.
        generated_images_dir: Utf8PathBuf
    );
    setter!(http_stylesheets_path: String);
    setter!(http_generated_images_path: String);
    setter!(retina_mark: RetinaMark);
    setter!(use_cache: bool);
    setter!(cache_dir: Utf8PathBuf);
    setter!(packing: PackingParams);
    setter!(compression: CompressionParams);
    setter!(no_sprite: bool);
    setter!(debug: bool);
}

/// Resolved configuration, read-only after construction.
///
/// The serialized form is part of every sprite fingerprint, so changing any
/// option that affects output invalidates cached sheets.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub project_path: Utf8PathBuf,
    pub base_uri: String,
    pub http_path: String,
    pub sass_dir: Utf8PathBuf,
    pub css_dir: String,
    pub images_dir: Utf8PathBuf,
    pub generated_images_dir: Utf8PathBuf,
    pub retina_mark: RetinaMark,
    pub use_cache: bool,
    pub cache_dir: Utf8PathBuf,
    pub packing: PackingParams,
    pub compression: CompressionParams,
    pub no_sprite: bool,
    #[serde(skip)]
    pub debug: bool,

    // derived
    pub sass_path: Utf8PathBuf,
    pub images_path: Utf8PathBuf,
    pub generated_images_path: Utf8PathBuf,
    pub http_stylesheets_path: String,
    pub http_generated_images_path: String,
}

/// Options merged with defaults, before anything is derived.
struct Merged {
    project_path: Utf8PathBuf,
    base_uri: String,
    http_path: String,
    sass_dir: Utf8PathBuf,
    css_dir: String,
    images_dir: Utf8PathBuf,
    generated_images_dir: Utf8PathBuf,
    http_stylesheets_path: Option<String>,
    http_generated_images_path: Option<String>,
    retina_mark: RetinaMark,
    use_cache: bool,
    cache_dir: Utf8PathBuf,
    packing: PackingParams,
    compression: CompressionParams,
    no_sprite: bool,
    debug: bool,
}

impl Config {
    pub fn resolve(options: Options) -> Self {
        derive(merge(options))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(Options::default())
    }
}

fn merge(options: Options) -> Merged {
    let images_dir = options.images_dir.unwrap_or_else(|| "images".into());

    Merged {
        project_path: options.project_path.unwrap_or_else(current_dir),
        base_uri: options.base_uri.unwrap_or_default(),
        http_path: options.http_path.unwrap_or_else(|| "/".into()),
        sass_dir: options.sass_dir.unwrap_or_else(|| "sass".into()),
        css_dir: options.css_dir.unwrap_or_else(|| "stylesheets".into()),
        generated_images_dir: options
            .generated_images_dir
            .unwrap_or_else(|| images_dir.clone()),
        images_dir,
        http_stylesheets_path: options.http_stylesheets_path,
        http_generated_images_path: options.http_generated_images_path,
        retina_mark: options.retina_mark.unwrap_or_default(),
        use_cache: options.use_cache.unwrap_or(true),
        cache_dir: options.cache_dir.unwrap_or_else(default_cache_dir),
        packing: options.packing.unwrap_or_default(),
        compression: options.compression.unwrap_or_default(),
        no_sprite: options.no_sprite.unwrap_or(false),
        debug: options.debug.unwrap_or(false),
    }
}

fn derive(m: Merged) -> Config {
    let project_path = paths::clean(&m.project_path);
    let sass_path = paths::resolve(&project_path, &m.sass_dir);
    let images_path = paths::resolve(&project_path, &m.images_dir);
    let generated_images_path = paths::resolve(&project_path, &m.generated_images_dir);
    let cache_dir = paths::resolve(&project_path, &m.cache_dir);

    let http_generated_images_path = m
        .http_generated_images_path
        .unwrap_or_else(|| paths::join(&m.http_path, m.generated_images_dir.as_str()));
    let http_stylesheets_path = m
        .http_stylesheets_path
        .unwrap_or_else(|| paths::join(&m.http_path, &m.css_dir));

    Config {
        project_path,
        base_uri: m.base_uri,
        http_path: m.http_path,
        sass_dir: m.sass_dir,
        css_dir: m.css_dir,
        images_dir: m.images_dir,
        generated_images_dir: m.generated_images_dir,
        retina_mark: m.retina_mark,
        use_cache: m.use_cache,
        cache_dir,
        packing: m.packing,
        compression: m.compression,
        no_sprite: m.no_sprite,
        debug: m.debug,
        sass_path,
        images_path,
        generated_images_path,
        http_stylesheets_path,
        http_generated_images_path,
    }
}

fn current_dir() -> Utf8PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|dir| Utf8PathBuf::try_from(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}

fn default_cache_dir() -> Utf8PathBuf {
    let tmp = std::env::temp_dir();
    let tmp = Utf8PathBuf::try_from(tmp).unwrap_or_else(|_| Utf8PathBuf::from(".cache"));
    tmp.join(DEFAULT_CACHE_DIR)
}

impl Config {
    /// Path relative to the project root, `/` separated.
    pub(crate) fn project_relative(&self, path: &Utf8Path) -> String {
        paths::display_relative(&self.project_path, path)
    }
}
