use crate::error::DatasetLoadError;
use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions treated as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

/// A class-labelled image directory: `<root>/<class_name>/<file>`.
///
/// Scanning only collects paths; images are decoded lazily by
/// [`ImageFolderDataset`](crate::dataset::ImageFolderDataset).
///
/// - Classes are the immediate subdirectories of `root`, indexed in
///   lexicographic order of their names.
/// - Files are collected recursively under each class directory, filtered by
///   [`IMAGE_EXTENSIONS`], and ordered by path so scans are reproducible.
///
/// # Example
/// ```ignore
/// let folder = ImageFolder::scan("medical_images_test/train")?;
/// assert_eq!(folder.classes(), ["NORMAL", "PNEUMONIA"]);
/// ```
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    entries: Vec<(PathBuf, usize)>,
}

impl ImageFolder {
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self, DatasetLoadError> {
        let root = root.into();
        let classes = find_classes(&root).map_err(|source| DatasetLoadError::Scan {
            path: root.clone(),
            source,
        })?;
        if classes.is_empty() {
            return Err(DatasetLoadError::NoClasses { path: root });
        }

        let mut entries = Vec::new();
        for (class_index, class_name) in classes.iter().enumerate() {
            let class_dir = root.join(class_name);
            let files = collect_images(&class_dir).map_err(|source| DatasetLoadError::Scan {
                path: class_dir.clone(),
                source,
            })?;
            entries.extend(files.into_iter().map(|path| (path, class_index)));
        }

        if entries.is_empty() {
            return Err(DatasetLoadError::EmptySplit { path: root });
        }

        Ok(Self {
            root,
            classes,
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Class names; a sample's label indexes into this slice.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// `(path, class_index)` pairs in scan order.
    pub fn entries(&self) -> &[(PathBuf, usize)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of files found per class, in class-index order.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for (_, class_index) in &self.entries {
            counts[*class_index] += 1;
        }
        counts
    }
}

fn find_classes(root: &Path) -> anyhow::Result<Vec<String>> {
    let read_dir = fs::read_dir(root)
        .with_context(|| format!("Failed to read directory: {}", root.display()))?;

    let mut classes = Vec::new();
    for entry in read_dir {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", root.display()))?;
        if entry.file_type()?.is_dir() {
            let name = entry
                .file_name()
                .into_string()
                .map_err(|name| anyhow!("Class directory name is not UTF-8: {:?}", name))?;
            classes.push(name);
        }
    }
    classes.sort();
    Ok(classes)
}

fn collect_images(class_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(class_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| anyhow!("Failed to read directory entry: {}", e))?;
        // Symlinks are not followed; only regular files count.
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_scan_orders_classes_and_files() -> Result<()> {
        let dir = tempdir()?;
        let d = dir.path();
        for class in ["zebra", "apple"] {
            fs::create_dir_all(d.join(class))?;
        }
        fs::create_dir_all(d.join("apple/nested"))?;

        // zero-byte files are fine: scanning never decodes
        File::create(d.join("zebra/b.JPG"))?;
        File::create(d.join("zebra/a.png"))?;
        File::create(d.join("apple/nested/c.jpeg"))?;
        File::create(d.join("apple/notes.txt"))?;
        File::create(d.join("stray.jpg"))?;

        let folder = ImageFolder::scan(d)?;
        assert_eq!(folder.classes(), ["apple", "zebra"]);
        assert_eq!(folder.len(), 3);
        assert_eq!(folder.class_counts(), vec![1, 2]);

        let names: Vec<_> = folder
            .entries()
            .iter()
            .map(|(p, c)| (p.file_name().unwrap().to_string_lossy().into_owned(), *c))
            .collect();
        assert_eq!(
            names,
            vec![
                ("c.jpeg".to_string(), 0),
                ("a.png".to_string(), 1),
                ("b.JPG".to_string(), 1)
            ]
        );
        Ok(())
    }

    #[test]
    fn test_scan_errors() -> Result<()> {
        let dir = tempdir()?;
        let d = dir.path();

        let missing = ImageFolder::scan(d.join("missing"));
        assert!(matches!(missing, Err(DatasetLoadError::Scan { .. })));

        let no_classes = ImageFolder::scan(d);
        assert!(matches!(no_classes, Err(DatasetLoadError::NoClasses { .. })));

        fs::create_dir_all(d.join("NORMAL"))?;
        File::create(d.join("NORMAL/readme.md"))?;
        let empty = ImageFolder::scan(d);
        assert!(matches!(empty, Err(DatasetLoadError::EmptySplit { .. })));
        Ok(())
    }
}
