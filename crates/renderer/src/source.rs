use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compile::DEFAULT_FRAGMENT_GLSL;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open file {} for reading", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("file {} is not valid UTF-8 text", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Fragment shader text, either read from disk or the built-in default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    text: String,
    origin: Option<PathBuf>,
}

impl ShaderSource {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// File the text was read from, `None` for the built-in default.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.origin.is_none()
    }
}

/// Reads the fragment shader fresh on every call; nothing is cached.
#[derive(Debug, Clone, Default)]
pub struct ShaderSourceLoader {
    path: Option<PathBuf>,
}

impl ShaderSourceLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Result<ShaderSource, LoadError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(ShaderSource {
                text: DEFAULT_FRAGMENT_GLSL.to_string(),
                origin: None,
            });
        };

        let bytes = fs::read(path).map_err(|source| LoadError::Open {
            path: path.clone(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|source| LoadError::Encoding {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "loaded fragment shader");

        Ok(ShaderSource {
            text,
            origin: Some(path.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn no_path_yields_default_shader() {
        let source = ShaderSourceLoader::new(None).load().unwrap();
        assert!(source.is_default());
        assert_eq!(source.text(), DEFAULT_FRAGMENT_GLSL);
    }

    #[test]
    fn file_contents_are_returned_exactly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wave.frag");
        // Larger than any fixed read chunk so growth is exercised.
        let body = "// padding line for the loader\n".repeat(400);
        let text = format!("#version 450\n{body}void main() {{}}\n");
        fs::write(&path, &text).unwrap();

        let source = ShaderSourceLoader::new(Some(path.clone())).load().unwrap();
        assert_eq!(source.text(), text);
        assert_eq!(source.text().len(), fs::metadata(&path).unwrap().len() as usize);
        assert_eq!(source.origin(), Some(path.as_path()));
    }

    #[test]
    fn every_load_rereads_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.frag");
        let loader = ShaderSourceLoader::new(Some(path.clone()));

        fs::write(&path, "first").unwrap();
        assert_eq!(loader.load().unwrap().text(), "first");
        fs::write(&path, "second").unwrap();
        assert_eq!(loader.load().unwrap().text(), "second");
    }

    #[test]
    fn missing_file_reports_open_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.frag");
        let err = ShaderSourceLoader::new(Some(path.clone())).load().unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
        assert!(err.to_string().contains("missing.frag"));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("binary.frag");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let err = ShaderSourceLoader::new(Some(path)).load().unwrap_err();
        assert!(matches!(err, LoadError::Encoding { .. }));
    }
}
