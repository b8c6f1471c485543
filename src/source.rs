//! VPD page sources
//!
//! Callers implement `VpdPageSource` to hand raw page 0x83 bytes to the
//! decoder. `SysfsVpdSource` reads them from the `vpd_pg83` attribute the
//! Linux SCSI layer exposes for every block device.

use crate::error::{VpdError, VpdResult};
use crate::identify::LuIdentifier;
use crate::vpd::Vpd83Page;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Default sysfs mount point
pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Environment variable overriding the default sysfs root
pub const SYSFS_ROOT_ENV: &str = "SASUTILS_SYSFS_ROOT";

/// Name of the binary attribute holding the Device Identification page
pub const VPD_PG83_ATTR: &str = "vpd_pg83";

/// Provider of raw Device Identification pages
pub trait VpdPageSource {
    /// Read the raw VPD page 0x83 of a block device (e.g. "sda")
    fn read_vpd83(&self, blkdev: &str) -> VpdResult<Vec<u8>>;

    /// Read and decode the logical unit NAA identifier of a block device
    ///
    /// `Ok(None)` means the device reports no logical unit NAA designator.
    fn lu_identifier(&self, blkdev: &str) -> VpdResult<Option<LuIdentifier>> {
        let data = self.read_vpd83(blkdev)?;
        let page = Vpd83Page::parse(&data)?;
        page.lu_identifier()
    }
}

/// Reads pages from `<root>/block/<blkdev>/device/vpd_pg83`
#[derive(Debug, Clone)]
pub struct SysfsVpdSource {
    root: PathBuf,
}

impl SysfsVpdSource {
    /// Create a new builder for configuring the source
    pub fn builder() -> SysfsVpdSourceBuilder {
        SysfsVpdSourceBuilder::new()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the `vpd_pg83` attribute of a block device
    pub fn attribute_path(&self, blkdev: &str) -> VpdResult<PathBuf> {
        validate_blkdev(blkdev)?;
        Ok(self
            .root
            .join("block")
            .join(blkdev)
            .join("device")
            .join(VPD_PG83_ATTR))
    }
}

impl VpdPageSource for SysfsVpdSource {
    fn read_vpd83(&self, blkdev: &str) -> VpdResult<Vec<u8>> {
        let path = self.attribute_path(blkdev)?;
        log::debug!("Reading {}", path.display());

        let mut file = File::open(&path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        log::debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(data)
    }
}

fn validate_blkdev(blkdev: &str) -> VpdResult<()> {
    if blkdev.is_empty() {
        return Err(VpdError::InvalidDevice("block device name is empty".to_string()));
    }
    if blkdev == "." || blkdev == ".." || blkdev.contains('/') || blkdev.contains('\0') {
        return Err(VpdError::InvalidDevice(format!(
            "'{}' is not a block device name (e.g. sda)",
            blkdev
        )));
    }
    Ok(())
}

/// Builder for configuring a sysfs page source
pub struct SysfsVpdSourceBuilder {
    sysfs_root: Option<PathBuf>,
}

impl SysfsVpdSourceBuilder {
    fn new() -> Self {
        Self { sysfs_root: None }
    }

    /// Set the sysfs mount point (default: $SASUTILS_SYSFS_ROOT or /sys)
    pub fn sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = Some(root.into());
        self
    }

    /// Build the source
    pub fn build(self) -> VpdResult<SysfsVpdSource> {
        let root = match self.sysfs_root {
            Some(root) => root,
            None => match std::env::var_os(SYSFS_ROOT_ENV) {
                Some(root) => {
                    log::debug!("Using sysfs root from {}: {:?}", SYSFS_ROOT_ENV, root);
                    PathBuf::from(root)
                }
                None => PathBuf::from(DEFAULT_SYSFS_ROOT),
            },
        };

        if !root.is_absolute() {
            return Err(VpdError::Config(format!(
                "sysfs root must be an absolute path, got {}",
                root.display()
            )));
        }

        Ok(SysfsVpdSource { root })
    }
}
