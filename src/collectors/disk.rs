use super::MetricSource;
use crate::metric::{ratio_percent, Metric, SourceError};
use std::path::{Path, PathBuf};
use sysinfo::{DiskExt, System, SystemExt};

pub const DEFAULT_MOUNT: &str = "/";

const PSEUDO_FILESYSTEMS: [&str; 9] = [
    "tmpfs", "devtmpfs", "overlay", "squashfs", "iso9660", "udf", "proc", "sysfs", "ramfs",
];

#[derive(Debug, Clone)]
pub struct DiskSource {
    mount: PathBuf,
}

impl DiskSource {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
        }
    }
}

impl Default for DiskSource {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT)
    }
}

impl MetricSource for DiskSource {
    fn name(&self) -> String {
        format!("disk:{}", self.mount.display())
    }

    fn sample(&self) -> Result<Metric, SourceError> {
        let entries = list_disks();
        let entry = resolve_mount(&entries, &self.mount)?;
        let used = entry.total_bytes.saturating_sub(entry.available_bytes);
        let pct = ratio_percent(used, entry.total_bytes).ok_or_else(|| {
            SourceError::Unavailable(format!(
                "файловая система {} на {} имеет нулевой размер",
                entry.device,
                self.mount.display()
            ))
        })?;
        Metric::percent(self.name(), pct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    pub device: String,
    pub mount: PathBuf,
    pub file_system: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskEntry {
    pub fn is_pseudo(&self) -> bool {
        let fs = self.file_system.to_lowercase();
        PSEUDO_FILESYSTEMS.contains(&fs.as_str()) || self.device.to_lowercase().contains("cdrom")
    }
}

/// Picks the real filesystem mounted at `mount`. When several entries share
/// the mount point the last one wins, since it shadows the earlier ones.
pub fn resolve_mount<'a>(
    entries: &'a [DiskEntry],
    mount: &Path,
) -> Result<&'a DiskEntry, SourceError> {
    entries
        .iter()
        .filter(|e| !e.is_pseudo())
        .filter(|e| e.mount == mount)
        .last()
        .ok_or_else(|| {
            SourceError::Unavailable(format!(
                "точка монтирования {} не найдена",
                mount.display()
            ))
        })
}

fn list_disks() -> Vec<DiskEntry> {
    let mut system = System::new();
    system.refresh_disks_list();
    system
        .disks()
        .iter()
        .map(|d| DiskEntry {
            device: d.name().to_string_lossy().to_string(),
            mount: d.mount_point().to_path_buf(),
            file_system: String::from_utf8_lossy(d.file_system()).to_string(),
            total_bytes: d.total_space(),
            available_bytes: d.available_space(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(device: &str, mount: &str, fs: &str, total: u64, avail: u64) -> DiskEntry {
        DiskEntry {
            device: device.to_string(),
            mount: PathBuf::from(mount),
            file_system: fs.to_string(),
            total_bytes: total,
            available_bytes: avail,
        }
    }

    #[test]
    fn skips_pseudo_filesystems_for_root() {
        let entries = vec![
            entry("overlay", "/", "overlay", 100, 90),
            entry("/dev/sda1", "/", "ext4", 100, 22),
            entry("tmpfs", "/run", "tmpfs", 10, 10),
        ];
        let found = resolve_mount(&entries, Path::new("/")).unwrap();
        assert_eq!(found.device, "/dev/sda1");
    }

    #[test]
    fn cdrom_device_is_ignored() {
        let entries = vec![entry("/dev/cdrom", "/media", "ext4", 100, 0)];
        assert!(matches!(
            resolve_mount(&entries, Path::new("/media")),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn last_entry_shadows_earlier_mounts() {
        let entries = vec![
            entry("/dev/sdb1", "/data", "xfs", 100, 50),
            entry("/dev/sdc1", "/data", "xfs", 100, 10),
        ];
        let found = resolve_mount(&entries, Path::new("/data")).unwrap();
        assert_eq!(found.device, "/dev/sdc1");
    }

    #[test]
    fn trailing_separator_resolves_same_mount() {
        let entries = vec![entry("/dev/sdb1", "/var", "ext4", 100, 40)];
        let found = resolve_mount(&entries, Path::new("/var/")).unwrap();
        assert_eq!(found.device, "/dev/sdb1");
    }

    #[test]
    fn missing_mount_is_unavailable() {
        let entries = vec![entry("/dev/sda1", "/", "ext4", 100, 22)];
        let err = resolve_mount(&entries, Path::new("/srv")).unwrap_err();
        assert!(err.to_string().contains("/srv"));
    }

    #[test]
    fn name_includes_mount() {
        assert_eq!(DiskSource::default().name(), "disk:/");
        assert_eq!(DiskSource::new("/var/log").name(), "disk:/var/log");
    }

    #[test]
    fn unknown_mount_fails_through_source() {
        let source = DiskSource::new("/definitely/not/a/mount/point");
        assert!(matches!(source.sample(), Err(SourceError::Unavailable(_))));
    }
}
