//! Fingerprinting and the on-disk cache gate.
//!
//! A fingerprint covers the project relative path and content digest of
//! every image, the serialized configuration and the crate version. When
//! URLs are relative it also covers the directory they are relative to. Its
//! short hash is the cache key embedded in the sheet and source file names.
//! A sidecar JSON record next to the generated source stores the full
//! fingerprint and the digest of the sheet image that was written with it.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collect::SpriteMap;
use crate::config::Config;
use crate::core::{Hash32, KEY_LEN};
use crate::error::SpriteError;
use crate::{io, paths};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity of one sprite map's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Full NUL separated fingerprint text.
    pub text: String,
    /// Short hex hash of `text`, used in file names.
    pub key: String,
}

/// Compute the fingerprint of a collected sprite map.
///
/// `url_base` is the directory generated URLs are relative to, `None` when
/// they are absolute.
pub fn fingerprint(map: &SpriteMap, config: &Config, url_base: Option<&str>) -> Fingerprint {
    let mut parts: Vec<String> = map
        .images
        .iter()
        .map(|image| format!("{}#{}", config.project_relative(&image.path), image.digest.to_hex()))
        .collect();

    // plain struct with string keys, serialization can't fail
    parts.push(serde_json::to_string(config).unwrap_or_default());
    if let Some(base) = url_base {
        parts.push(format!("url-base:{base}"));
    }
    parts.push(VERSION.to_string());

    let text = parts.join("\0");
    let key = Hash32::hash(&text).to_key();

    Fingerprint { text, key }
}

/// Files produced for one sprite map and cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outputs {
    /// The packed sheet image.
    pub sheet: Utf8PathBuf,
    /// Generated stylesheet source.
    pub source: Utf8PathBuf,
    /// Sidecar [`CacheRecord`].
    pub record: Utf8PathBuf,
}

impl Outputs {
    pub fn new(map: &SpriteMap, key: &str, config: &Config) -> Self {
        let stem = map.stem();
        let cache_stem = cache_stem(map);

        Self {
            sheet: sheet_dir(map, config).join(format!("{stem}-{key}.png")),
            source: config.cache_dir.join(format!("{cache_stem}-{key}.scss")),
            record: config.cache_dir.join(format!("{cache_stem}-{key}.json")),
        }
    }
}

/// Sheets are placed next to where the image directory would be in the
/// generated images directory, `a/icons/*.png` ends up in `a/`.
fn sheet_dir(map: &SpriteMap, config: &Config) -> Utf8PathBuf {
    let dir = paths::resolve(&config.generated_images_path, map.url_dir());
    dir.parent().map(ToOwned::to_owned).unwrap_or(dir)
}

/// All maps share the cache directory, so cache files carry a short hash
/// of the import directory next to the map stem.
fn cache_stem(map: &SpriteMap) -> String {
    format!("{}-{}", map.stem(), Hash32::hash(map.url_dir()).to_key())
}

/// Sidecar metadata persisted next to the generated source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub fingerprint: String,
    /// Hex digest of the sheet image, `None` when no sheet was packed.
    #[serde(rename = "imageHash")]
    pub image_hash: Option<String>,
}

/// Decide whether the outputs on disk still match `fp`.
///
/// Any I/O error, parse error or mismatch is a miss, never an error.
pub fn check_cache(fp: &Fingerprint, outputs: &Outputs, config: &Config) -> bool {
    if !config.use_cache || !outputs.source.is_file() {
        return false;
    }

    let Some(record) = read_record(outputs) else {
        return false;
    };

    if record.fingerprint != fp.text {
        return false;
    }

    match record.image_hash {
        Some(expected) => Hash32::hash_file(&outputs.sheet)
            .map(|actual| actual.to_hex() == expected)
            .unwrap_or(false),
        None => config.no_sprite,
    }
}

fn read_record(outputs: &Outputs) -> Option<CacheRecord> {
    let data = fs::read(&outputs.record).ok()?;
    serde_json::from_slice(&data).ok()
}

pub(crate) fn write_record(
    outputs: &Outputs,
    fp: &Fingerprint,
    image_hash: Option<Hash32>,
) -> Result<(), SpriteError> {
    let record = CacheRecord {
        fingerprint: fp.text.clone(),
        image_hash: image_hash.map(Hash32::to_hex),
    };

    let mut data = serde_json::to_string(&record)
        .map_err(|e| SpriteError::Write(outputs.record.clone(), e.into()))?;
    data.push('\n');

    io::output_file(&outputs.record, data)
}

/// Delete sheets, generated sources and records left behind by earlier keys
/// of the same map. Failures are logged and otherwise ignored.
pub(crate) fn clear_stale(map: &SpriteMap, config: &Config) {
    remove_matching(&config.cache_dir, &cache_stem(map), "scss|json", config);
    remove_matching(&sheet_dir(map, config), &map.stem(), "png", config);
}

fn remove_matching(dir: &Utf8Path, stem: &str, extensions: &str, config: &Config) {
    let pattern = format!(
        r"^{}-[0-9a-f]{{{KEY_LEN}}}\.({extensions})$",
        regex::escape(stem)
    );
    let Ok(matcher) = Regex::new(&pattern) else {
        return;
    };

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if !matcher.is_match(name) {
            continue;
        }

        debug!(config, "delete: {}", name);

        if let Err(e) = fs::remove_file(entry.path()) {
            tracing::warn!("couldn't delete stale cache file {}: {}", name, e);
        }
    }
}
