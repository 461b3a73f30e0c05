use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that abort one sprite map resolution.
///
/// Every variant is fatal for the current cycle. Failures while checking the
/// cache never show up here, a broken cache is just a miss.
#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("Import '{0}' does not name an image directory.")]
    Import(String),

    #[error("Couldn't collect sprite images.\n{0}")]
    Collect(#[from] CollectError),

    #[error("Couldn't pack the sprite sheet.\n{0}")]
    Pack(#[source] anyhow::Error),

    #[error("Couldn't compress the sprite sheet.\n{0}")]
    Compress(#[source] anyhow::Error),

    #[error("Couldn't write '{0}'.\n{1}")]
    Write(Utf8PathBuf, #[source] std::io::Error),

    #[error("Couldn't render the sprite stylesheet.\n{0}")]
    Render(#[from] std::fmt::Error),
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Couldn't read image '{0}'.\n{1}")]
    Io(Utf8PathBuf, #[source] std::io::Error),

    #[error("Couldn't read dimensions of image '{0}'.\n{1}")]
    Dimensions(Utf8PathBuf, #[source] image::ImageError),
}

/// Raised when a user supplied retina marker is not a valid regular expression.
#[derive(Debug, Error)]
#[error("Invalid retina marker pattern.\n{0}")]
pub struct RetinaMarkError(#[from] pub regex::Error);

/// Errors that can occur when compiling stylesheets with sprite imports.
#[cfg(feature = "grass")]
#[derive(Debug, Error)]
pub enum StyleError {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A Sass compilation error occurred.
    #[error("Sass compilation error: {0}")]
    Sass(#[from] Box<grass::Error>),

    /// A sprite import couldn't be resolved.
    #[error("Sprite error: {0}")]
    Sprite(#[from] SpriteError),
}
