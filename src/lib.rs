#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

/// Stage diagnostics, emitted only when the `debug` option is set.
macro_rules! debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.debug {
            tracing::info!($($arg)*);
        }
    };
}

mod cache;
mod collect;
mod config;
mod core;
mod error;
mod importer;
mod io;
#[cfg(feature = "logging")]
mod logging;
mod pack;
mod paths;
mod render;
mod selectors;
#[cfg(feature = "grass")]
mod stylesheet;

pub use crate::cache::{CacheRecord, Fingerprint, Outputs, check_cache, fingerprint};
pub use crate::collect::{ImageEntry, SpriteMap, collect};
pub use crate::config::{
    CompressionLevel, CompressionParams, Config, Layout, Options, PackingParams, RetinaMark,
};
pub use crate::core::Hash32;
pub use crate::error::*;
pub use crate::importer::{ImportResult, SpriteImporter};
#[cfg(feature = "logging")]
pub use crate::logging::init_logging;
pub use crate::pack::{
    Compressor, LayoutPacker, PackedSheet, Packer, PngCompressor, Rect, SheetMetadata,
    compress_sheet, pack_map,
};
pub use crate::render::{px, render_no_sprite, render_sprite};
pub use crate::selectors::{PseudoGroup, PseudoState, Selectors, partition};
#[cfg(feature = "grass")]
pub use crate::stylesheet::{SpriteFs, compile_path, expand_imports};
