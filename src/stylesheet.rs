//! Compiling stylesheets with sprite imports through `grass`.
//!
//! `grass` has no importer callbacks, so [`SpriteFs`] sits between the
//! compiler and the disk. Whenever a stylesheet is read, each
//! `@import "<dir>/<glob>.png";` statement in it is replaced with the
//! generated source for that sprite map.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;

use crate::error::StyleError;
use crate::importer::SpriteImporter;

static PNG_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+["']([^"']+\.png)["']\s*;"#).expect("png import pattern is valid")
});

/// File system adapter handed to `grass`.
#[derive(Debug)]
pub struct SpriteFs<'a> {
    importer: &'a SpriteImporter,
}

impl<'a> SpriteFs<'a> {
    pub fn new(importer: &'a SpriteImporter) -> Self {
        Self { importer }
    }
}

impl grass::Fs for SpriteFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let data = fs::read(path)?;

        let Some(path) = Utf8Path::from_path(path) else {
            return Ok(data);
        };

        if !matches!(path.extension(), Some("scss" | "sass")) {
            return Ok(data);
        }

        let source = String::from_utf8(data).map_err(io::Error::other)?;
        let source = expand_imports(self.importer, &source, path)
            .map_err(|e| io::Error::other(e.to_string()))?;

        Ok(source.into_bytes())
    }
}

/// Replace every sprite import in `source` with the generated stylesheet.
///
/// `prev` is the path of the file `source` was read from.
pub fn expand_imports(
    importer: &SpriteImporter,
    source: &str,
    prev: &Utf8Path,
) -> Result<String, StyleError> {
    importer.track_root(prev);

    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for captures in PNG_IMPORT.captures_iter(source) {
        let (Some(statement), Some(url)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let Some(result) = importer.resolve(url.as_str(), prev)? else {
            continue;
        };

        out.push_str(&source[last..statement.start()]);
        out.push_str(&fs::read_to_string(&result.file)?);
        last = statement.end();
    }

    out.push_str(&source[last..]);
    Ok(out)
}

/// Compile the stylesheet at `path`, resolving sprite imports on the way.
pub fn compile_path(
    importer: &SpriteImporter,
    path: impl AsRef<Path>,
    style: grass::OutputStyle,
) -> Result<String, StyleError> {
    let fs = SpriteFs::new(importer);
    let options = grass::Options::default().fs(&fs).style(style);

    Ok(grass::from_path(path, &options)?)
}
