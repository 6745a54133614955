// Markdown export.

use std::path::{Path, PathBuf};

use commish_core::model::WeeklyDocument;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("failed to write {path}: {source}")]
pub struct ExportError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Target file for `--out`.
///
/// An existing directory, or a path ending in a separator, receives the
/// document under its download name. Anything else is used as-is.
pub fn resolve_output_path(out: &Path, doc: &WeeklyDocument) -> PathBuf {
    let names_dir = out.is_dir()
        || out
            .as_os_str()
            .to_string_lossy()
            .ends_with(std::path::MAIN_SEPARATOR);
    if names_dir {
        out.join(doc.file_name())
    } else {
        out.to_path_buf()
    }
}

/// Write the document, creating parent directories. Returns the final path.
pub fn write_document(out: &Path, doc: &WeeklyDocument) -> Result<PathBuf, ExportError> {
    let path = resolve_output_path(out, doc);
    let io_err = |source| ExportError {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(&path, doc.markdown.as_bytes()).map_err(io_err)?;

    info!(path = %path.display(), bytes = doc.markdown.len(), "document written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use commish_core::model::{DocumentKind, WeekContext};

    fn doc() -> WeeklyDocument {
        WeeklyDocument {
            kind: DocumentKind::Preview,
            context: WeekContext::new(97124817, 2024, 3),
            markdown: "# Weekly Preview\n".to_string(),
            used_fallback: false,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("commish_export_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn directory_gets_download_name() {
        let dir = temp_dir("dir");
        let path = write_document(&dir, &doc()).unwrap();
        assert_eq!(path, dir.join("weekly_preview_97124817_2024_w3.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Weekly Preview\n");
    }

    #[test]
    fn explicit_file_path_is_kept_and_parents_created() {
        let dir = temp_dir("file");
        let target = dir.join("nested/out.md");
        let path = write_document(&target, &doc()).unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
    }

    #[test]
    fn trailing_separator_means_directory() {
        let dir = temp_dir("sep");
        let out = PathBuf::from(format!(
            "{}{}new{}",
            dir.display(),
            std::path::MAIN_SEPARATOR,
            std::path::MAIN_SEPARATOR
        ));
        let path = resolve_output_path(&out, &doc());
        assert!(path.ends_with("new/weekly_preview_97124817_2024_w3.md"));
    }
}
