//! Flat-directory file store
//!
//! Every call opens, operates on and closes its files before returning, so
//! any number of workers (threads or processes) can share one directory
//! without further locking. Nothing is cached between calls.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::logging::*;
use crate::protocol::{Command, Response};
use crate::validation::validate_filename;

/// Suffix of in-progress upload files; such names are never listed or accepted
pub const TEMP_SUFFIX: &str = ".fileserv-tmp";

/// A file read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
	pub name: String,
	pub content: Vec<u8>,
}

/// Storage backend scoped to a single working directory
#[derive(Debug, Clone)]
pub struct Storage {
	root: PathBuf,
}

impl Storage {
	/// Open a store on an existing directory
	pub fn open(root: impl Into<PathBuf>) -> Result<Self, ServiceError> {
		let root = root.into();
		let meta = fs::metadata(&root)
			.map_err(|e| ServiceError::io(format!("Cannot open {}", root.display()), e))?;
		if !meta.is_dir() {
			return Err(ServiceError::io(
				format!("Cannot open {}", root.display()),
				io::Error::new(io::ErrorKind::Other, "not a directory"),
			));
		}
		Ok(Storage { root })
	}

	/// Names of the regular files in the directory, sorted
	pub fn list(&self) -> Result<Vec<String>, ServiceError> {
		let entries = fs::read_dir(&self.root)
			.map_err(|e| ServiceError::io(format!("Cannot read {}", self.root.display()), e))?;

		let mut names = Vec::new();
		for entry_result in entries {
			let entry = match entry_result {
				Ok(e) => e,
				Err(e) => {
					debug!("Error reading directory entry: {}", e);
					continue;
				}
			};

			// symlink_metadata: links are not regular files of this store
			let meta = match fs::symlink_metadata(entry.path()) {
				Ok(m) => m,
				Err(e) => {
					debug!("Cannot access {}: {}", entry.path().display(), e);
					continue;
				}
			};
			if !meta.is_file() {
				continue;
			}

			match entry.file_name().into_string() {
				Ok(name) if !name.ends_with(TEMP_SUFFIX) => names.push(name),
				Ok(_) => {}
				Err(raw) => debug!("Skipping non UTF-8 filename {:?}", raw),
			}
		}
		names.sort();
		Ok(names)
	}

	/// Read a whole file
	pub fn get(&self, filename: &str) -> Result<StoredFile, ServiceError> {
		if filename.is_empty() {
			return Err(ServiceError::NotFound { filename: String::new() });
		}
		validate_filename(filename)?;

		let path = self.root.join(filename);
		if !self.is_regular_file(&path)? {
			return Err(ServiceError::NotFound { filename: filename.to_string() });
		}
		match fs::read(&path) {
			Ok(content) => Ok(StoredFile { name: filename.to_string(), content }),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				Err(ServiceError::NotFound { filename: filename.to_string() })
			}
			Err(e) => Err(ServiceError::io(format!("Cannot read {}", filename), e)),
		}
	}

	/// Create a new file; never replaces an existing one
	///
	/// Content goes to a temp file first which is then hard linked into
	/// place. The link fails with `AlreadyExists` if another upload won the
	/// race, so readers only ever see complete files.
	pub fn upload(&self, filename: &str, content: &[u8]) -> Result<u64, ServiceError> {
		validate_filename(filename)?;

		let target = self.root.join(filename);
		if fs::symlink_metadata(&target).is_ok() {
			return Err(ServiceError::Conflict { filename: filename.to_string() });
		}

		let tmp = self.root.join(format!(".{}{}", Uuid::new_v4(), TEMP_SUFFIX));
		if let Err(e) = write_new_file(&tmp, content) {
			let _ = fs::remove_file(&tmp);
			return Err(ServiceError::io(format!("Cannot write {}", filename), e));
		}

		let linked = match fs::hard_link(&tmp, &target) {
			Err(e) if no_hard_links(&e) => {
				debug!("Hard link failed ({}), renaming instead", e);
				rename_if_absent(&tmp, &target)
			}
			other => other,
		};

		if let Err(e) = fs::remove_file(&tmp) {
			if e.kind() != io::ErrorKind::NotFound {
				warn!("Cannot remove temp file {}: {}", tmp.display(), e);
			}
		}

		match linked {
			Ok(()) => {
				debug!("Stored {} ({} bytes)", filename, content.len());
				Ok(content.len() as u64)
			}
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
				Err(ServiceError::Conflict { filename: filename.to_string() })
			}
			Err(e) => Err(ServiceError::io(format!("Cannot store {}", filename), e)),
		}
	}

	/// Remove a file
	pub fn delete(&self, filename: &str) -> Result<(), ServiceError> {
		validate_filename(filename)?;

		let path = self.root.join(filename);
		if !self.is_regular_file(&path)? {
			return Err(ServiceError::NotFound { filename: filename.to_string() });
		}
		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				Err(ServiceError::NotFound { filename: filename.to_string() })
			}
			Err(e) => Err(ServiceError::io(format!("Cannot delete {}", filename), e)),
		}
	}

	/// Run one command and wrap the outcome in a response envelope
	pub fn execute(&self, command: Command) -> Response {
		let result = match command {
			Command::List => self.list().map(Response::file_list),
			Command::Get(filename) => self.get(&filename).map(|f| Response::file(f.name, f.content)),
			Command::Upload { filename, data } => self.upload(&filename, &data).map(|size| {
				Response::message(format!("File {} uploaded ({} bytes)", filename, size))
			}),
			Command::Delete(filename) => {
				self.delete(&filename).map(|_| Response::message(format!("File {} deleted", filename)))
			}
		};

		result.unwrap_or_else(|e| {
			if let ServiceError::Io { .. } = e {
				error!("Storage failure: {}", e);
			} else {
				debug!("Request rejected: {}", e);
			}
			Response::from(e)
		})
	}

	/// Remove upload temp files left behind by an interrupted server
	pub fn cleanup_temp_files(&self) -> Result<usize, ServiceError> {
		let entries = fs::read_dir(&self.root)
			.map_err(|e| ServiceError::io(format!("Cannot read {}", self.root.display()), e))?;

		let mut count = 0;
		for entry in entries.flatten() {
			let name = entry.file_name();
			let is_temp = name.to_str().map(|n| n.ends_with(TEMP_SUFFIX)).unwrap_or(false);
			if !is_temp {
				continue;
			}
			// Ignore "not found" errors - another process may have removed it
			match fs::remove_file(entry.path()) {
				Ok(()) => count += 1,
				Err(e) if e.kind() == io::ErrorKind::NotFound => {}
				Err(e) => warn!("Failed to remove temp file {:?}: {}", entry.path(), e),
			}
		}
		if count > 0 {
			info!("Cleaned up {} temporary files", count);
		}
		Ok(count)
	}

	fn is_regular_file(&self, path: &Path) -> Result<bool, ServiceError> {
		match fs::symlink_metadata(path) {
			Ok(meta) => Ok(meta.is_file()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(ServiceError::io(format!("Cannot access {}", path.display()), e)),
		}
	}
}

/// vfat and some FUSE mounts answer EPERM rather than ENOTSUP
fn no_hard_links(e: &io::Error) -> bool {
	matches!(e.kind(), io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied)
}

/// Rename that refuses to replace an existing target
fn rename_if_absent(tmp: &Path, target: &Path) -> io::Result<()> {
	if fs::symlink_metadata(target).is_ok() {
		return Err(io::Error::from(io::ErrorKind::AlreadyExists));
	}
	fs::rename(tmp, target)
}

fn write_new_file(path: &Path, content: &[u8]) -> io::Result<()> {
	let mut f = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
	f.write_all(content)?;
	f.sync_all()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use tempfile::TempDir;

	fn store() -> (TempDir, Storage) {
		let dir = TempDir::new().unwrap();
		let storage = Storage::open(dir.path()).unwrap();
		(dir, storage)
	}

	#[test]
	fn test_open_missing_directory_fails() {
		let dir = TempDir::new().unwrap();
		let err = Storage::open(dir.path().join("nope")).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Io);
	}

	#[test]
	fn test_list_empty() {
		let (_dir, storage) = store();
		assert!(storage.list().unwrap().is_empty());
	}

	#[test]
	fn test_list_skips_directories_and_temp_files() {
		let (dir, storage) = store();
		fs::write(dir.path().join("b.txt"), b"b").unwrap();
		fs::write(dir.path().join("a.txt"), b"a").unwrap();
		fs::create_dir(dir.path().join("sub")).unwrap();
		fs::write(dir.path().join(format!(".x{}", TEMP_SUFFIX)), b"partial").unwrap();

		assert_eq!(storage.list().unwrap(), vec!["a.txt".to_string(), "b.txt".to_string()]);
	}

	#[test]
	fn test_upload_then_get_roundtrip() {
		let (_dir, storage) = store();
		let data = vec![0u8, 1, 2, 255, 254];
		assert_eq!(storage.upload("bin.dat", &data).unwrap(), 5);
		let file = storage.get("bin.dat").unwrap();
		assert_eq!(file.name, "bin.dat");
		assert_eq!(file.content, data);
	}

	#[test]
	fn test_upload_empty_file() {
		let (_dir, storage) = store();
		assert_eq!(storage.upload("empty.txt", b"").unwrap(), 0);
		assert!(storage.get("empty.txt").unwrap().content.is_empty());
	}

	#[test]
	fn test_upload_conflict_keeps_original() {
		let (dir, storage) = store();
		storage.upload("a.txt", b"first").unwrap();
		let err = storage.upload("a.txt", b"second").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Conflict);
		assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"first");
	}

	#[test]
	fn test_upload_leaves_no_temp_files() {
		let (dir, storage) = store();
		storage.upload("a.txt", b"x").unwrap();
		let _ = storage.upload("a.txt", b"y");
		let names: Vec<_> = fs::read_dir(dir.path())
			.unwrap()
			.map(|e| e.unwrap().file_name().into_string().unwrap())
			.collect();
		assert_eq!(names, vec!["a.txt".to_string()]);
	}

	#[test]
	fn test_get_missing_and_empty_are_not_found() {
		let (_dir, storage) = store();
		assert_eq!(storage.get("missing.txt").unwrap_err().kind(), ErrorKind::NotFound);
		assert_eq!(storage.get("").unwrap_err().kind(), ErrorKind::NotFound);
	}

	#[test]
	fn test_get_directory_is_not_found() {
		let (dir, storage) = store();
		fs::create_dir(dir.path().join("sub")).unwrap();
		assert_eq!(storage.get("sub").unwrap_err().kind(), ErrorKind::NotFound);
	}

	#[test]
	fn test_delete_then_get_not_found() {
		let (_dir, storage) = store();
		storage.upload("a.txt", b"x").unwrap();
		storage.delete("a.txt").unwrap();
		assert_eq!(storage.get("a.txt").unwrap_err().kind(), ErrorKind::NotFound);
		assert_eq!(storage.delete("a.txt").unwrap_err().kind(), ErrorKind::NotFound);
	}

	#[test]
	fn test_traversal_rejected_everywhere() {
		let (_dir, storage) = store();
		assert_eq!(storage.get("../secret").unwrap_err().kind(), ErrorKind::Malformed);
		assert_eq!(storage.upload("../evil", b"x").unwrap_err().kind(), ErrorKind::Malformed);
		assert_eq!(storage.upload("/tmp/evil", b"x").unwrap_err().kind(), ErrorKind::Malformed);
		assert_eq!(storage.delete("sub/x").unwrap_err().kind(), ErrorKind::Malformed);
		assert_eq!(storage.upload("", b"x").unwrap_err().kind(), ErrorKind::Malformed);
	}

	#[test]
	fn test_cleanup_temp_files() {
		let (dir, storage) = store();
		fs::write(dir.path().join(format!(".a{}", TEMP_SUFFIX)), b"1").unwrap();
		fs::write(dir.path().join(format!(".b{}", TEMP_SUFFIX)), b"2").unwrap();
		fs::write(dir.path().join("keep.txt"), b"3").unwrap();
		assert_eq!(storage.cleanup_temp_files().unwrap(), 2);
		assert_eq!(storage.list().unwrap(), vec!["keep.txt".to_string()]);
	}

	#[test]
	fn test_execute_wraps_outcomes() {
		let (_dir, storage) = store();
		let resp = storage.execute(Command::Upload { filename: "a.txt".into(), data: b"hello".to_vec() });
		assert!(resp.is_ok());
		assert_eq!(resp.to_json(), r#"{"status":"OK","data":"File a.txt uploaded (5 bytes)"}"#);

		let resp = storage.execute(Command::Get("missing.txt".into()));
		assert!(!resp.is_ok());
		assert_eq!(resp.to_json(), r#"{"status":"ERROR","data":"File not found: missing.txt"}"#);
	}

	#[test]
	fn test_link_fallback_triggers_on_eperm() {
		assert!(no_hard_links(&io::Error::from(io::ErrorKind::PermissionDenied)));
		assert!(no_hard_links(&io::Error::from(io::ErrorKind::Unsupported)));
		assert!(!no_hard_links(&io::Error::from(io::ErrorKind::AlreadyExists)));
		assert!(!no_hard_links(&io::Error::from(io::ErrorKind::NotFound)));
	}

	#[test]
	fn test_rename_if_absent_never_replaces() {
		let dir = TempDir::new().unwrap();
		let tmp = dir.path().join(format!(".x{}", TEMP_SUFFIX));
		let target = dir.path().join("a.txt");

		fs::write(&tmp, b"first").unwrap();
		rename_if_absent(&tmp, &target).unwrap();
		assert_eq!(fs::read(&target).unwrap(), b"first");
		assert!(!tmp.exists());

		fs::write(&tmp, b"second").unwrap();
		let err = rename_if_absent(&tmp, &target).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
		assert_eq!(fs::read(&target).unwrap(), b"first");
		assert!(tmp.exists());
	}
}

// vim: ts=4
