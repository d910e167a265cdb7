use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

/// Directory inside a web archive whose jars are scanned as well.
const NESTED_LIB_PREFIX: &str = "WEB-INF/lib/";

/// One file inside an application artifact.
///
/// `bytes` is only populated for class files; resources are matched by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub name: String,
    pub bytes: Option<Vec<u8>>,
}

impl ContentEntry {
    pub fn is_class(&self) -> bool {
        self.name.ends_with(".class")
    }
}

/// A byte-addressable view of an application artifact.
pub trait ArtifactContents: Send + Sync {
    fn entries(&self) -> LauncherResult<Vec<ContentEntry>>;
}

/// Open `path` as archive contents or as an exploded class directory.
pub fn open_contents(path: &Path) -> LauncherResult<Box<dyn ArtifactContents>> {
    if path.is_dir() {
        Ok(Box::new(DirectoryContents::new(path)))
    } else if path.is_file() {
        Ok(Box::new(ArchiveContents::new(path)))
    } else {
        Err(LauncherError::Analysis {
            path: path.to_path_buf(),
            reason: "artifact does not exist".into(),
        })
    }
}

/// A jar or war on disk. Jars under `WEB-INF/lib/` are opened and scanned
/// one level deep.
pub struct ArchiveContents {
    path: PathBuf,
}

impl ArchiveContents {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn analysis_error(&self, reason: impl ToString) -> LauncherError {
        LauncherError::Analysis {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ArtifactContents for ArchiveContents {
    fn entries(&self) -> LauncherResult<Vec<ContentEntry>> {
        let file = std::fs::File::open(&self.path).map_err(|e| self.analysis_error(e))?;
        let archive = zip::ZipArchive::new(file).map_err(|e| self.analysis_error(e))?;

        let mut entries = Vec::new();
        read_archive(archive, true, &mut entries).map_err(|e| self.analysis_error(e))?;
        debug!("Scanned {:?}: {} entries", self.path, entries.len());
        Ok(entries)
    }
}

fn read_archive<R: Read + Seek>(
    mut archive: zip::ZipArchive<R>,
    descend: bool,
    out: &mut Vec<ContentEntry>,
) -> Result<(), zip::result::ZipError> {
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();

        if descend && name.starts_with(NESTED_LIB_PREFIX) && name.ends_with(".jar") {
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            let nested = match zip::ZipArchive::new(Cursor::new(buf)) {
                Ok(nested) => nested,
                Err(e) => {
                    warn!("Unreadable nested jar {}: {}", name, e);
                    return Err(e);
                }
            };
            read_archive(nested, false, out)?;
            continue;
        }

        let bytes = if name.ends_with(".class") {
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            Some(buf)
        } else {
            None
        };
        out.push(ContentEntry { name, bytes });
    }
    Ok(())
}

/// An exploded class output directory.
pub struct DirectoryContents {
    root: PathBuf,
}

impl DirectoryContents {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn walk(&self, dir: &Path, out: &mut Vec<ContentEntry>) -> LauncherResult<()> {
        let read_dir = std::fs::read_dir(dir).map_err(|e| LauncherError::Analysis {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        for entry in read_dir {
            let entry = entry.map_err(|e| LauncherError::Analysis {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, out)?;
                continue;
            }

            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let bytes = if name.ends_with(".class") {
                Some(std::fs::read(&path).map_err(|e| LauncherError::Analysis {
                    path: path.clone(),
                    reason: e.to_string(),
                })?)
            } else {
                None
            };
            out.push(ContentEntry { name, bytes });
        }
        Ok(())
    }
}

impl ArtifactContents for DirectoryContents {
    fn entries(&self) -> LauncherResult<Vec<ContentEntry>> {
        let mut entries = Vec::new();
        self.walk(&self.root, &mut entries)?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// Contents assembled in memory, for hosts that already hold the bytes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContents {
    entries: Vec<ContentEntry>,
}

impl InMemoryContents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, name: &str, bytes: &[u8]) -> Self {
        self.entries.push(ContentEntry {
            name: name.to_string(),
            bytes: Some(bytes.to_vec()),
        });
        self
    }

    pub fn with_resource(mut self, name: &str) -> Self {
        self.entries.push(ContentEntry {
            name: name.to_string(),
            bytes: None,
        });
        self
    }
}

impl ArtifactContents for InMemoryContents {
    fn entries(&self) -> LauncherResult<Vec<ContentEntry>> {
        Ok(self.entries.clone())
    }
}
