use std::path::{Path, PathBuf};

use crate::error::Result;

/// Extensions picked up by the corpus scan.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// One source file, identified by its path.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub text: String,
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext))
}

/// Scan a directory tree for text documents.
///
/// Hidden files and gitignored paths are skipped; results are sorted by
/// path so chunk order is stable across runs.
///
/// # Errors
///
/// Returns an error if a matched file cannot be read.
pub async fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let mut paths: Vec<PathBuf> = ignore::WalkBuilder::new(dir)
        .hidden(true)
        .git_ignore(true)
        .build()
        .flatten()
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()) && is_text_file(e.path()))
        .map(ignore::DirEntry::into_path)
        .collect();
    paths.sort();

    if paths.is_empty() {
        tracing::warn!(dir = %dir.display(), "no text documents found");
    }

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path).await?;
        documents.push(Document {
            id: path.display().to_string(),
            text,
        });
    }

    tracing::info!(count = documents.len(), dir = %dir.display(), "documents loaded");
    Ok(documents)
}
