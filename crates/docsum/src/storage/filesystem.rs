use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::StorageError;

/// Keeps the raw bytes of every upload in a single flat directory.
pub struct UploadStorage {
    upload_directory: PathBuf,
}

impl UploadStorage {
    pub fn new<P: AsRef<Path>>(upload_directory: P) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
        }
    }

    /// Writes `content` under a fresh `<millis>-<random>.<extension>` name and
    /// returns its path. Never overwrites an existing file.
    pub fn store(&self, content: &[u8], extension: &str) -> Result<PathBuf, StorageError> {
        self.ensure_directory(&self.upload_directory)?;

        let filename = unique_filename(extension);
        self.store_with_atomic_creation(&filename, content)
    }

    /// Stores content using atomic file creation to avoid race conditions.
    fn store_with_atomic_creation(
        &self,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let (base, ext) = match filename.rfind('.') {
            Some(dot_pos) => (&filename[..dot_pos], Some(&filename[dot_pos..])),
            None => (filename, None),
        };

        for counter in 1..=1000 {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };

            let try_path = self.upload_directory.join(&try_filename);

            // create_new is O_CREAT | O_EXCL: fails if the file exists
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(self.upload_directory.join(filename)))
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        std::fs::read(path).map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Deletes a stored file. Returns `false` if it was already gone.
    pub fn remove(&self, path: &Path) -> Result<bool, StorageError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Stored file already missing: {}", path.display());
                Ok(false)
            }
            Err(e) => Err(StorageError::RemoveFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

fn unique_filename(extension: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    let millis = Utc::now().timestamp_millis();
    if extension.is_empty() {
        format!("{}-{}", millis, &random[..12])
    } else {
        format!("{}-{}.{}", millis, &random[..12], extension)
    }
}
