// Instance Agent - File Storage
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Reading and atomically replacing configuration files.
//!
//! All paths handed to [`FileStore`] are absolute guest paths
//! (`/etc/hosts`); they are resolved under a configurable root so the
//! agent can operate on a chroot or a test directory.
//!
//! Replacing a file happens in two phases. [`FileStore::stage`] writes
//! every changed file next to its target as `<path>.<pid>~` with its final
//! owner and mode. [`FileStore::commit`] then moves each current file aside
//! to `<path>.<unix-seconds>~` and renames the staged copy into place,
//! restoring the backup if that rename fails. Staged files that never get
//! committed are removed when the [`StagedChanges`] is dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::models::{Error, FileOwner, Result};

/// Mode of every file the agent writes.
const FILE_MODE: u32 = 0o644;

/// Entry of a configuration directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
}

/// Read-only view of the current configuration, used by backends.
pub trait ConfigSource {
    /// File content, `None` when the file doesn't exist.
    fn read(&self, path: &Path) -> Result<Option<String>>;

    /// Entries of a directory, empty when it doesn't exist.
    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>>;

    /// Whether anything exists at `path` (dangling symlinks included).
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a symbolic link.
    fn is_symlink(&self, path: &Path) -> bool;
}

/// A file written to its temporary sibling, waiting for commit.
#[derive(Debug)]
struct StagedFile {
    path: PathBuf,
    target: PathBuf,
    temp: PathBuf,
}

/// Files staged by [`FileStore::stage`].
#[derive(Debug, Default)]
pub struct StagedChanges {
    files: Vec<StagedFile>,
    unchanged: Vec<PathBuf>,
}

impl StagedChanges {
    /// Whether no file needs replacing.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Guest paths that will be replaced on commit.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Guest paths whose content already matched.
    pub fn unchanged(&self) -> &[PathBuf] {
        &self.unchanged
    }
}

impl Drop for StagedChanges {
    fn drop(&mut self) {
        for file in self.files.drain(..) {
            if let Err(e) = fs::remove_file(&file.temp) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove staged file {:?}: {}", file.temp, e);
                }
            }
        }
    }
}

/// What a commit changed on disk.
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    pub written: Vec<PathBuf>,
    pub retired: Vec<PathBuf>,
    pub linked: Vec<PathBuf>,
}

/// Filesystem access rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    owner: Option<FileOwner>,
}

impl FileStore {
    /// Create a store rooted at `root`. `owner` is applied to written files.
    pub fn new(root: impl Into<PathBuf>, owner: Option<FileOwner>) -> Self {
        Self {
            root: root.into(),
            owner,
        }
    }

    /// Root every guest path is resolved under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a guest path under the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("/") {
            Ok(relative) => self.root.join(relative),
            Err(_) => self.root.join(path),
        }
    }

    /// Write every file whose content differs to its temporary sibling.
    pub fn stage(&self, files: &BTreeMap<PathBuf, String>) -> Result<StagedChanges> {
        let mut staged = StagedChanges::default();

        for (path, content) in files {
            let target = self.resolve(path);

            match fs::read(&target) {
                Ok(current) if current == content.as_bytes() => {
                    info!("Skipping {} (no changes)", path.display());
                    staged.unchanged.push(path.clone());
                    continue;
                }
                _ => {}
            }

            let temp = with_suffix(&target, &format!(".{}~", std::process::id()));
            info!("Writing {}", path.display());

            // Dropping `staged` on error removes the temps written so far
            if let Err(e) = self.write_temp(&temp, content) {
                let _ = fs::remove_file(&temp);
                return Err(Error::apply(path.clone(), e));
            }

            staged.files.push(StagedFile {
                path: path.clone(),
                target,
                temp,
            });
        }

        Ok(staged)
    }

    fn write_temp(&self, temp: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = temp.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(temp, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(owner) = self.owner {
                std::os::unix::fs::chown(temp, Some(owner.uid), Some(owner.gid))?;
            }
            fs::set_permissions(temp, fs::Permissions::from_mode(FILE_MODE))?;
        }

        Ok(())
    }

    /// Move staged files into place, retire `remove`, then create symlinks.
    ///
    /// Stops at the first failure; files already committed stay committed.
    pub fn commit(
        &self,
        mut staged: StagedChanges,
        remove: &BTreeSet<PathBuf>,
        symlinks: &[(PathBuf, PathBuf)],
    ) -> Result<CommitReport> {
        let mut report = CommitReport::default();

        while !staged.files.is_empty() {
            let file = staged.files.remove(0);
            if let Err(e) = self.commit_file(&file) {
                let _ = fs::remove_file(&file.temp);
                return Err(Error::apply(file.path, e));
            }
            report.written.push(file.path);
        }

        for path in remove {
            let target = self.resolve(path);
            if fs::symlink_metadata(&target).is_err() {
                continue;
            }
            let backup = backup_path(&target);
            info!("Moving aside old file {}", path.display());
            fs::rename(&target, &backup).map_err(|e| Error::apply(path.clone(), e))?;
            report.retired.push(path.clone());
        }

        for (link, destination) in symlinks {
            let resolved = self.resolve(link);
            if fs::symlink_metadata(&resolved).is_ok() {
                debug!("Symlink {} already present", link.display());
                continue;
            }
            info!("Linking {} -> {}", link.display(), destination.display());
            make_symlink(destination, &resolved).map_err(|e| Error::apply(link.clone(), e))?;
            report.linked.push(link.clone());
        }

        Ok(report)
    }

    fn commit_file(&self, file: &StagedFile) -> io::Result<()> {
        let backup = if fs::symlink_metadata(&file.target).is_ok() {
            let backup = backup_path(&file.target);
            fs::rename(&file.target, &backup)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&file.temp, &file.target) {
            if let Some(backup) = backup {
                if let Err(restore) = fs::rename(&backup, &file.target) {
                    warn!(
                        "Failed to restore {:?} from {:?}: {}",
                        file.target, backup, restore
                    );
                }
            }
            return Err(e);
        }

        Ok(())
    }
}

impl ConfigSource for FileStore {
    fn read(&self, path: &Path) -> Result<Option<String>> {
        match fs::read(self.resolve(path)) {
            Ok(bytes) => Ok(Some(decode(path, bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::ConfigReadFailed(format!("{}: {}", path.display(), e))),
        }
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
        let entries = match fs::read_dir(self.resolve(path)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::ConfigReadFailed(format!("{}: {}", path.display(), e))),
        };

        let mut listing: Vec<DirEntryInfo> = entries
            .flatten()
            .map(|entry| DirEntryInfo {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: entry.path().is_dir(),
            })
            .collect();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(self.resolve(path)).is_ok()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(self.resolve(path))
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }
}

/// Decode file content, replacing invalid UTF-8 sequences with U+FFFD.
fn decode(path: &Path, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            warn!("{} is not valid UTF-8, replacing invalid bytes", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

/// `path` with `suffix` appended to its file name.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// First free `<path>.<unix-seconds>~` (with a counter on collision).
fn backup_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().timestamp();
    let mut candidate = with_suffix(path, &format!(".{}~", stamp));
    let mut n = 1;
    while fs::symlink_metadata(&candidate).is_ok() {
        candidate = with_suffix(path, &format!(".{}.{}~", stamp, n));
        n += 1;
    }
    candidate
}

#[cfg(unix)]
fn make_symlink(destination: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(destination, link)
}

#[cfg(not(unix))]
fn make_symlink(_destination: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks not supported"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> FileStore {
        FileStore::new(dir.path(), None)
    }

    fn files(entries: &[(&str, &str)]) -> BTreeMap<PathBuf, String> {
        entries
            .iter()
            .map(|(p, c)| (PathBuf::from(p), c.to_string()))
            .collect()
    }

    fn backups(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with('~'))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_stage_and_commit_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let staged = store.stage(&files(&[("/etc/hostname", "myhost\n")])).unwrap();
        assert_eq!(staged.paths(), vec![PathBuf::from("/etc/hostname")]);

        let report = store.commit(staged, &BTreeSet::new(), &[]).unwrap();
        assert_eq!(report.written, vec![PathBuf::from("/etc/hostname")]);
        assert_eq!(
            fs::read_to_string(dir.path().join("etc/hostname")).unwrap(),
            "myhost\n"
        );
        assert!(backups(&dir.path().join("etc")).is_empty());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir.path().join("etc/hostname")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn test_existing_file_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/hosts"), "old\n").unwrap();

        let store = store(&dir);
        let staged = store.stage(&files(&[("/etc/hosts", "new\n")])).unwrap();
        store.commit(staged, &BTreeSet::new(), &[]).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("etc/hosts")).unwrap(), "new\n");
        let backups = backups(&dir.path().join("etc"));
        assert_eq!(backups.len(), 1);
        assert!(backups[0].starts_with("hosts."));
        assert_eq!(
            fs::read_to_string(dir.path().join("etc").join(&backups[0])).unwrap(),
            "old\n"
        );
    }

    #[test]
    fn test_identical_content_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/hosts"), "same\n").unwrap();

        let staged = store(&dir).stage(&files(&[("/etc/hosts", "same\n")])).unwrap();
        assert!(staged.is_empty());
        assert_eq!(staged.unchanged(), &[PathBuf::from("/etc/hosts")]);
    }

    #[test]
    fn test_failed_rename_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let etc = dir.path().join("etc");
        fs::create_dir_all(&etc).unwrap();
        fs::write(etc.join("hosts"), "old\n").unwrap();

        let store = store(&dir);
        let staged = store.stage(&files(&[("/etc/hosts", "new\n")])).unwrap();
        fs::remove_file(&staged.files[0].temp).unwrap();

        let err = store.commit(staged, &BTreeSet::new(), &[]).unwrap_err();
        assert!(err.is_apply());
        assert_eq!(fs::read_to_string(etc.join("hosts")).unwrap(), "old\n");
        assert!(backups(&etc).is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_read_lossily() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/hosts"), b"127.0.0.1\tlocalhost # caf\xe9\n").unwrap();

        let store = store(&dir);
        let content = store.read(Path::new("/etc/hosts")).unwrap().unwrap();
        assert_eq!(content, "127.0.0.1\tlocalhost # caf\u{FFFD}\n");

        // Rewriting the decoded text is a real change; a second pass is not.
        let staged = store.stage(&files(&[("/etc/hosts", content.as_str())])).unwrap();
        assert!(!staged.is_empty());
        store.commit(staged, &BTreeSet::new(), &[]).unwrap();
        let staged = store.stage(&files(&[("/etc/hosts", content.as_str())])).unwrap();
        assert!(staged.is_empty());
    }

    #[test]
    fn test_dropped_stage_leaves_no_temps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let staged = store
            .stage(&files(&[("/etc/a", "a\n"), ("/etc/b", "b\n")]))
            .unwrap();
        assert_eq!(backups(&dir.path().join("etc")).len(), 2);

        drop(staged);
        assert!(backups(&dir.path().join("etc")).is_empty());
        assert!(!dir.path().join("etc/a").exists());
    }

    #[test]
    fn test_remove_set_is_renamed_aside() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("etc/sysconfig/network-scripts");
        fs::create_dir_all(&scripts).unwrap();
        fs::write(scripts.join("ifcfg-eth9"), "DEVICE=eth9\n").unwrap();

        let store = store(&dir);
        let remove: BTreeSet<PathBuf> = [
            PathBuf::from("/etc/sysconfig/network-scripts/ifcfg-eth9"),
            PathBuf::from("/etc/sysconfig/network-scripts/ifcfg-missing"),
        ]
        .into_iter()
        .collect();

        let report = store.commit(StagedChanges::default(), &remove, &[]).unwrap();
        assert_eq!(report.retired.len(), 1);
        assert!(!scripts.join("ifcfg-eth9").exists());
        assert_eq!(backups(&scripts).len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_created_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc/init.d")).unwrap();
        let store = store(&dir);
        let links = vec![(PathBuf::from("/etc/init.d/net.eth0"), PathBuf::from("net.lo"))];

        let report = store.commit(StagedChanges::default(), &BTreeSet::new(), &links).unwrap();
        assert_eq!(report.linked.len(), 1);
        assert!(store.is_symlink(Path::new("/etc/init.d/net.eth0")));

        let report = store.commit(StagedChanges::default(), &BTreeSet::new(), &links).unwrap();
        assert!(report.linked.is_empty());
    }

    #[test]
    fn test_config_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert_eq!(store.read(Path::new("/etc/rc.conf")).unwrap(), None);
        assert!(store.list_dir(Path::new("/etc/network.d")).unwrap().is_empty());

        fs::create_dir_all(dir.path().join("etc/network.d/examples")).unwrap();
        fs::write(dir.path().join("etc/network.d/eth0"), "x").unwrap();
        let listing = store.list_dir(Path::new("/etc/network.d")).unwrap();
        assert_eq!(
            listing,
            vec![
                DirEntryInfo { name: "eth0".into(), is_dir: false },
                DirEntryInfo { name: "examples".into(), is_dir: true },
            ]
        );
        assert_eq!(store.read(Path::new("/etc/network.d/eth0")).unwrap().as_deref(), Some("x"));
    }
}
