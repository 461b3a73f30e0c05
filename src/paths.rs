//! Lexical path helpers.
//!
//! Web paths are always `/` separated strings and never touch the file
//! system. File system paths are cleaned with camino components, also
//! without touching the disk, so paths that don't exist yet can be derived.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Normalise a `/` separated path, resolving `.` and `..` segments.
///
/// A leading `/` is preserved. `..` above the root of an absolute path is
/// dropped, for relative paths it is kept. An empty result is `.`.
pub(crate) fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            part => parts.push(part),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join two web paths and normalise the result.
pub(crate) fn join(base: &str, path: &str) -> String {
    match (base.is_empty(), path.is_empty()) {
        (true, true) => ".".to_string(),
        (true, false) => normalize(path),
        (false, true) => normalize(base),
        (false, false) => normalize(&format!("{base}/{path}")),
    }
}

/// Parent directory of a normalised web path.
pub(crate) fn dirname(path: &str) -> String {
    let path = normalize(path);

    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => path[..i].to_string(),
        None => ".".to_string(),
    }
}

/// Relative web path leading from directory `from` to `to`.
///
/// Both sides are treated as rooted at the same place, a leading `/` on
/// either side is ignored.
pub(crate) fn relative(from: &str, to: &str) -> String {
    let from = normalize(from);
    let to = normalize(to);

    let split = |path: &str| -> Vec<String> {
        path.split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .map(str::to_string)
            .collect()
    };

    let from = split(&from);
    let to = split(&to);

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    parts.extend(std::iter::repeat_n("..", from.len() - common));
    parts.extend(to[common..].iter().map(String::as_str));
    parts.join("/")
}

/// Resolve `path` against `base` and clean the result lexically.
pub(crate) fn resolve(base: &Utf8Path, path: impl AsRef<Utf8Path>) -> Utf8PathBuf {
    clean(&base.join(path))
}

/// Lexically clean a file system path.
pub(crate) fn clean(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();

    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                let last = out.components().next_back();
                match last {
                    Some(Utf8Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Utf8Component::RootDir) | Some(Utf8Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_str()),
        }
    }

    if out.as_str().is_empty() {
        out.push(".");
    }

    out
}

/// Path relative to `base`, `/` separated, used for log lines and fingerprints.
pub(crate) fn display_relative(base: &Utf8Path, path: &Utf8Path) -> String {
    match path.strip_prefix(base) {
        Ok(rest) => rest.as_str().replace('\\', "/"),
        Err(_) => path.as_str().replace('\\', "/"),
    }
}
