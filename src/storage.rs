use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use sysinfo::Disks;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::models::Item;

/// On-device layout: `<root>/<roms_dir>/<platform dir>/<fs_name>`.
///
/// Cloned into the download worker at spawn time, so switching roots only
/// affects downloads started afterwards.
#[derive(Debug, Clone)]
pub struct Storage {
    roots: Vec<PathBuf>,
    active: usize,
    roms_dir: String,
    platform_dirs: BTreeMap<String, String>,
}

impl Storage {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.roots.is_empty() {
            return Err(StorageError::NoRoots);
        }
        Ok(Self {
            roots: config.roots.clone(),
            active: 0,
            roms_dir: config.roms_dir.clone(),
            platform_dirs: config.platforms.clone(),
        })
    }

    pub fn active_root(&self) -> &Path {
        &self.roots[self.active]
    }

    /// 1-based slot of the active root, as printed on the device ("SD 1").
    pub fn active_slot(&self) -> usize {
        self.active + 1
    }

    /// Moves to the next configured root. A root that does not exist, or a
    /// single configured root, leaves the current selection untouched.
    pub fn switch_root(&mut self) -> Result<&Path, StorageError> {
        if self.roots.len() < 2 {
            return Err(StorageError::NoAlternateRoot);
        }
        let next = (self.active + 1) % self.roots.len();
        if !self.roots[next].is_dir() {
            return Err(StorageError::RootNotFound(self.roots[next].clone()));
        }
        self.active = next;
        Ok(self.active_root())
    }

    pub fn platform_directory(&self, slug: &str) -> PathBuf {
        let dir = self.platform_dirs.get(slug).map(String::as_str).unwrap_or(slug);
        self.active_root().join(&self.roms_dir).join(dir)
    }

    pub fn item_path(&self, item: &Item) -> PathBuf {
        self.platform_directory(&item.platform_slug).join(sanitize_file_name(&item.fs_name))
    }

    /// Multi-file items land as a directory, single files as a file.
    pub fn is_item_present(&self, item: &Item) -> bool {
        let path = self.item_path(item);
        if item.is_archive() { path.is_dir() } else { path.is_file() }
    }

    pub fn remove_item(&self, item: &Item) -> Result<(), StorageError> {
        let path = self.item_path(item);
        let result = if path.is_dir() { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
        result.map_err(|source| StorageError::Io { path, source })
    }

    /// Free bytes on the disk holding the active root, if it can be matched
    /// to a mount point.
    pub fn available_space(&self) -> Option<u64> {
        let disks = Disks::new_with_refreshed_list();
        let root = self.active_root();
        disks
            .list()
            .iter()
            .filter(|disk| root.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
    }
}

/// Replaces characters FAT/exFAT cards reject.
pub fn sanitize_file_name(name: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let re = INVALID.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("static regex"));
    let cleaned = re.replace_all(name, "_");
    let trimmed = cleaned.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() { "_".to_string() } else { trimmed.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::item;
    use tempfile::TempDir;

    fn storage_with(roots: Vec<PathBuf>) -> Storage {
        let mut config = StorageConfig::default();
        config.roots = roots;
        config.platforms.insert("snes".to_string(), "SFC".to_string());
        Storage::new(&config).unwrap()
    }

    #[test]
    fn platform_directory_uses_overrides() {
        let storage = storage_with(vec![PathBuf::from("/mnt/mmc")]);
        assert_eq!(storage.platform_directory("snes"), PathBuf::from("/mnt/mmc/ROMS/SFC"));
        assert_eq!(storage.platform_directory("gba"), PathBuf::from("/mnt/mmc/ROMS/gba"));
    }

    #[test]
    fn presence_follows_filesystem() {
        let dir = TempDir::new().unwrap();
        let storage = storage_with(vec![dir.path().to_path_buf()]);
        let rom = item(1, "gba", "Golden Sun.gba");
        assert!(!storage.is_item_present(&rom));

        let path = storage.item_path(&rom);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"rom").unwrap();
        assert!(storage.is_item_present(&rom));

        storage.remove_item(&rom).unwrap();
        assert!(!storage.is_item_present(&rom));
    }

    #[test]
    fn multi_file_items_are_directories() {
        let dir = TempDir::new().unwrap();
        let storage = storage_with(vec![dir.path().to_path_buf()]);
        let mut disc = item(2, "psx", "Final Fantasy VII");
        disc.multi = true;

        fs::create_dir_all(storage.item_path(&disc)).unwrap();
        assert!(storage.is_item_present(&disc));
        storage.remove_item(&disc).unwrap();
        assert!(!storage.item_path(&disc).exists());
    }

    #[test]
    fn switch_to_missing_root_keeps_selection() {
        let first = TempDir::new().unwrap();
        let mut storage = storage_with(vec![first.path().to_path_buf(), PathBuf::from("/definitely/not/here")]);

        let err = storage.switch_root().unwrap_err();
        assert!(matches!(err, StorageError::RootNotFound(_)));
        assert_eq!(storage.active_root(), first.path());
        assert_eq!(storage.active_slot(), 1);
    }

    #[test]
    fn switch_cycles_between_existing_roots() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let mut storage = storage_with(vec![first.path().to_path_buf(), second.path().to_path_buf()]);

        assert_eq!(storage.switch_root().unwrap(), second.path());
        assert_eq!(storage.active_slot(), 2);
        assert_eq!(storage.switch_root().unwrap(), first.path());
    }

    #[test]
    fn switch_with_single_root_is_an_error() {
        let only = TempDir::new().unwrap();
        let mut storage = storage_with(vec![only.path().to_path_buf()]);

        assert!(matches!(storage.switch_root(), Err(StorageError::NoAlternateRoot)));
        assert_eq!(storage.active_root(), only.path());
        assert_eq!(storage.active_slot(), 1);
    }

    #[test]
    fn empty_roots_rejected() {
        let mut config = StorageConfig::default();
        config.roots.clear();
        assert!(matches!(Storage::new(&config), Err(StorageError::NoRoots)));
    }

    #[test]
    fn sanitizes_card_hostile_names() {
        assert_eq!(sanitize_file_name("Zelda: A Link/Past?.sfc"), "Zelda_ A Link_Past_.sfc");
        assert_eq!(sanitize_file_name("trailing. "), "trailing");
        assert_eq!(sanitize_file_name("..."), "_");
        assert_eq!(sanitize_file_name("Tetris (World).gb"), "Tetris (World).gb");
    }
}
