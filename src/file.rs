use mime_guess::from_path;
use std::{
    fs::File as FsFile,
    io,
    path::{Path, PathBuf},
};
use tiny_http::{Header, Response, ResponseBox};

pub struct File {
    pub path: PathBuf,
    pub content_type: String,
}

impl File {
    pub fn new(path: PathBuf) -> Self {
        Self {
            content_type: content_type(&path),
            path,
        }
    }

    /// Opens the file once; the body length comes from that same handle.
    pub fn response(&self) -> io::Result<ResponseBox> {
        let fs_file = FsFile::open(&self.path)?;
        let mut response = Response::from_file(fs_file);

        if let Ok(header) = Header::from_bytes("Content-Type", self.content_type.as_str()) {
            response = response.with_header(header);
        }

        Ok(response.boxed())
    }
}

/// Infers a content type from the file extension. The browser-facing types are
/// pinned; everything else goes through the MIME table.
pub fn content_type(path: &Path) -> String {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_lowercase());

    match extension.as_deref() {
        Some("html" | "htm") => "text/html".into(),
        Some("js" | "mjs") => "application/javascript".into(),
        Some("css") => "text/css".into(),
        _ => from_path(path).first_or_octet_stream().essence_str().into(),
    }
}
