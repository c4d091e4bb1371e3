//! Static file serving for built client assets.

use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    /// Map a URL path into the base directory, rejecting anything that
    /// would escape it (`..`, absolute components).
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "html" => "text/html",
            "css" => "text/css",
            "js" | "mjs" => "application/javascript",
            "json" | "map" => "application/json",
            "txt" => "text/plain",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "ico" => "image/x-icon",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            _ => "application/octet-stream",
        }
    }

    /// Read a file under the base directory.
    pub fn load(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        let bytes = std::fs::read(&path)?;
        Ok((bytes, Self::content_type(&path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_path_prevents_traversal() {
        let sf = StaticFiles::new("/srv/static");
        assert!(sf.map_path("../secrets").is_none());
        assert!(sf.map_path("a/../../secrets").is_none());
        assert!(sf.map_path("ok/file.css").is_some());
    }

    #[test]
    fn load_reports_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "body{}").unwrap();
        let sf = StaticFiles::new(dir.path());
        let (bytes, ct) = sf.load("app.css").unwrap();
        assert_eq!(ct, "text/css");
        assert_eq!(bytes, b"body{}");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let sf = StaticFiles::new(dir.path());
        assert!(sf.load("nope.js").is_err());
    }
}
