//! Writes run outputs below the output directory.
//!
//! ```text
//! <out>/knowledge/knowledge.json
//! <out>/knowledge/files.json
//! <out>/knowledge/usage.json
//! <out>/converted/app.js
//! <out>/converted/controllers/*.js
//! <out>/converted/services/*.js
//! <out>/converted/daos/*.js
//! ```
//!
//! Any write failure is fatal for the run.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use strata_core::codegen::RenderedFile;
use strata_core::exporter;

pub const KNOWLEDGE_DIR: &str = "knowledge";
pub const CONVERTED_DIR: &str = "converted";

pub struct OutputWriter {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create output directory: {}", root.display()))?;
        Ok(Self {
            root,
            written: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Serialize `document` as pretty JSON to `knowledge/<name>`.
    pub fn write_document<T: Serialize>(&mut self, name: &str, document: &T) -> Result<PathBuf> {
        let json = exporter::export(document, true)
            .with_context(|| format!("Failed to serialize {}", name))?;
        let path = self.root.join(KNOWLEDGE_DIR).join(name);
        self.write_file(&path, &json)?;
        Ok(path)
    }

    /// Write a rendered file under `converted/`.
    pub fn write_rendered(&mut self, file: &RenderedFile) -> Result<PathBuf> {
        let relative = Path::new(&file.relative_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            anyhow::bail!("Refusing to write outside the output directory: {}", file.relative_path);
        }
        let path = self.root.join(CONVERTED_DIR).join(relative);
        self.write_file(&path, &file.contents)?;
        Ok(path)
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote output file");
        self.written.push(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_document_and_rendered_file() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::new(dir.path().join("out")).unwrap();

        let doc = writer
            .write_document("usage.json", &serde_json::json!({ "records": [] }))
            .unwrap();
        assert!(doc.ends_with("knowledge/usage.json"));
        assert!(fs::read_to_string(&doc).unwrap().contains("\"records\""));

        let file = RenderedFile {
            relative_path: "controllers/OrderController.js".to_string(),
            contents: "module.exports = router;\n".to_string(),
        };
        let path = writer.write_rendered(&file).unwrap();
        assert!(path.ends_with("converted/controllers/OrderController.js"));
        assert_eq!(writer.written().len(), 2);
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::new(dir.path()).unwrap();
        let file = RenderedFile {
            relative_path: "../evil.js".to_string(),
            contents: String::new(),
        };
        assert!(writer.write_rendered(&file).is_err());
    }
}
