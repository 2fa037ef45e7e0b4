use crate::error::{Result, ServeError};
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    Directory(PathBuf),
}

/// Splits a request target into its path and query, dropping any fragment.
pub fn split_url(url: &str) -> (&str, Option<&str>) {
    let url = url.split('#').next().unwrap_or_default();

    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Maps a request path onto the file system beneath `root`, which must already
/// be canonical. Anything that climbs out of the root, lexically or through a
/// symlink, is forbidden.
pub fn resolve(root: &Path, request_path: &str) -> Result<Target> {
    let decoded =
        percent_decode(request_path).ok_or_else(|| ServeError::NotFound(request_path.into()))?;
    let segments =
        normalize(&decoded).ok_or_else(|| ServeError::Forbidden(request_path.into()))?;

    let candidate = segments
        .iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment));

    let canonical = candidate
        .canonicalize()
        .map_err(|error| ServeError::from_io(error, request_path))?;

    if !canonical.starts_with(root) {
        return Err(ServeError::Forbidden(request_path.into()));
    }

    let metadata = canonical
        .metadata()
        .map_err(|error| ServeError::from_io(error, request_path))?;

    if metadata.is_dir() {
        Ok(Target::Directory(canonical))
    } else if decoded.ends_with('/') {
        Err(ServeError::NotFound(request_path.into()))
    } else {
        Ok(Target::File(canonical))
    }
}

/// Rebuilds a request path from its normalized segments, each percent-encoded,
/// so the result is ASCII and always rooted at a single `/`.
pub fn encoded_path(request_path: &str) -> Option<String> {
    let decoded = percent_decode(request_path)?;

    Some(
        normalize(&decoded)?
            .iter()
            .map(|segment| format!("/{}", percent_encode(segment)))
            .collect(),
    )
}

/// Collapses `.` and `..` segments. Returns `None` when the path escapes the
/// root or carries a segment that is not a plain file name.
pub fn normalize(path: &str) -> Option<Vec<&str>> {
    let mut segments = vec![];

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            _ if segment.contains(['\\', '\0']) => return None,
            _ if cfg!(windows) && segment.contains(':') => return None,
            _ => segments.push(segment),
        }
    }

    Some(segments)
}

/// Decodes `%XX` escapes. Malformed escapes pass through untouched; the result
/// must be valid UTF-8.
pub fn percent_decode(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'%' {
            let escape = bytes
                .get(index + 1..index + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());

            if let Some(byte) = escape {
                decoded.push(byte);
                index += 3;
                continue;
            }
        }

        decoded.push(bytes[index]);
        index += 1;
    }

    String::from_utf8(decoded).ok()
}

/// Encodes a file name for use inside an href.
pub fn percent_encode(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());

    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded += &format!("%{byte:02X}"),
        }
    }

    encoded
}
