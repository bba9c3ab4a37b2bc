use std::fs;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{RepairError, Result};
use crate::{detect_language, Language};

/// Directory and file names never copied into a workspace or walked for
/// sources: VCS metadata, virtualenvs, caches and build output.
const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "target",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "rsrepair-build",
];

/// A discovered source file and the module path used for coverage lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: Utf8PathBuf,
    pub package: String,
    pub language: Language,
}

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.contains(&name) || name.ends_with(".pyc") || name.ends_with(".pyo")
}

/// Recursively copy `src` into `dst`. Symlinks and special files are left
/// out, as is everything `should_skip` names.
pub fn copy_project(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| RepairError::io(dst, e))?;
    let entries = fs::read_dir(src).map_err(|e| RepairError::io(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RepairError::io(src, e))?;
        let name = entry.file_name();
        if should_skip(&name.to_string_lossy()) {
            continue;
        }
        let from = entry.path();
        let to = dst.join(&name);
        let kind = entry.file_type().map_err(|e| RepairError::io(&from, e))?;
        if kind.is_dir() {
            copy_project(&from, &to)?;
        } else if kind.is_file() {
            fs::copy(&from, &to).map_err(|e| RepairError::io(&from, e))?;
        }
    }
    Ok(())
}

/// Find the project root by walking up from source_file looking for markers.
pub fn find_project_root(source_file: &Path) -> PathBuf {
    let markers = &[
        "pyproject.toml",
        "setup.py",
        "setup.cfg",
        "package.json",
        "Cargo.toml",
        "go.mod",
        ".git",
    ];
    let start = if source_file.is_dir() {
        source_file
    } else {
        source_file.parent().unwrap_or(source_file)
    };
    let mut dir = start;
    loop {
        for marker in markers {
            if dir.join(marker).exists() {
                return dir.to_path_buf();
            }
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }
    start.to_path_buf()
}

/// Expand source paths into the flat, sorted list of supported source files.
/// Directories are walked recursively; files are taken as given.
pub fn discover_sources(paths: &[Utf8PathBuf]) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for path in paths {
        let canonical = canonical(path)?;
        if canonical.is_dir() {
            let mut found = Vec::new();
            walk_sources(&canonical, &mut found)?;
            found.sort();
            for file in found {
                let language = detect_language(file.as_std_path())
                    .ok_or_else(|| RepairError::UnsupportedLanguage(file.clone().into()))?;
                let package = module_path(&canonical, &file);
                files.push(SourceFile {
                    path: file,
                    package,
                    language,
                });
            }
        } else {
            let language = detect_language(canonical.as_std_path())
                .ok_or_else(|| RepairError::UnsupportedLanguage(canonical.clone().into()))?;
            let package = canonical.file_stem().unwrap_or_default().to_string();
            files.push(SourceFile {
                path: canonical,
                package,
                language,
            });
        }
    }
    let mut seen = std::collections::HashSet::new();
    files.retain(|f| seen.insert(f.path.clone()));
    Ok(files)
}

fn canonical(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let resolved = fs::canonicalize(path).map_err(|e| RepairError::io(path.as_std_path(), e))?;
    Utf8PathBuf::from_path_buf(resolved)
        .map_err(|p| RepairError::Setup(format!("source path is not valid UTF-8: {}", p.display())))
}

fn walk_sources(dir: &Utf8Path, found: &mut Vec<Utf8PathBuf>) -> Result<()> {
    let entries = dir
        .read_dir_utf8()
        .map_err(|e| RepairError::io(dir.as_std_path(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RepairError::io(dir.as_std_path(), e))?;
        if should_skip(entry.file_name()) {
            continue;
        }
        let ft = entry
            .file_type()
            .map_err(|e| RepairError::io(entry.path().as_std_path(), e))?;
        if ft.is_dir() {
            walk_sources(entry.path(), found)?;
        } else if ft.is_file() && detect_language(entry.path().as_std_path()).is_some() {
            found.push(entry.path().to_path_buf());
        }
    }
    Ok(())
}

/// `root/app/util.py` → `app.util`.
fn module_path(root: &Utf8Path, file: &Utf8Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file).with_extension("");
    relative
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(".")
}
