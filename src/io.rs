use std::fmt::Display;
use std::fs;
use std::time::Instant;

use camino::Utf8Path;
use console::Style;

use crate::error::SpriteError;

const ANSI_BLUE: Style = Style::new().blue();

pub(crate) fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Write a whole file, creating missing parent directories first.
///
/// Files are replaced in place, there is no temporary file and rename.
pub(crate) fn output_file(path: &Utf8Path, data: impl AsRef<[u8]>) -> Result<(), SpriteError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir) //
            .map_err(|e| SpriteError::Write(dir.to_owned(), e))?;
    }

    fs::write(path, data) //
        .map_err(|e| SpriteError::Write(path.to_owned(), e))
}
