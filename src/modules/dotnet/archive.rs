use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::errors::DecompilerError;

/// Every regular file below `root`, sorted.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>, DecompilerError> {
    let mut out = Vec::new();
    collect(root, &mut out, &mut Vec::new())?;
    out.sort();
    Ok(out)
}

/// `path` relative to `root`, joined with `/` whatever the platform.
pub fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compresses the contents of `dir` into a zip at `dest`. Entry names are relative to `dir`.
pub fn zip_directory(dir: &Path, dest: &Path) -> Result<PathBuf, DecompilerError> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    collect(dir, &mut files, &mut dirs)?;
    files.sort();
    dirs.sort();

    let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for d in &dirs {
        zip.add_directory(relative_name(dir, d), options)?;
    }
    for f in &files {
        zip.start_file(relative_name(dir, f), options)?;
        let mut src = File::open(f)?;
        std::io::copy(&mut src, &mut zip)?;
    }
    let mut inner = zip.finish()?;
    inner.flush()?;
    Ok(dest.to_path_buf())
}

fn collect(dir: &Path, files: &mut Vec<PathBuf>, dirs: &mut Vec<PathBuf>) -> Result<(), DecompilerError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            dirs.push(path.clone());
            collect(&path, files, dirs)?;
        } else if ft.is_file() {
            files.push(path);
        }
    }
    Ok(())
}
