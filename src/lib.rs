//! SCSI Device Identification VPD page decoding for SAS block devices
//!
//! This library extracts the logical unit World-Wide Name from a VPD page
//! 0x83 buffer, as found in `/sys/block/<name>/device/vpd_pg83`, so that a
//! block device can be matched with its place in a SAS topology.
//!
//! Decoding is a pure function of the page bytes. Reading the bytes is left
//! to a `VpdPageSource`; `SysfsVpdSource` covers the Linux sysfs case.
//!
//! # Example
//!
//! ```no_run
//! use sasutils::{SysfsVpdSource, VpdPageSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SysfsVpdSource::builder().sysfs_root("/sys").build()?;
//! match source.lu_identifier("sda")? {
//!     Some(wwn) => println!("sda {}", wwn),
//!     None => eprintln!("sda has no logical unit NAA identifier"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod identify;
pub mod source;
pub mod vpd;

pub use error::{VpdError, VpdResult};
pub use identify::{decode_vpd83_lu, select_lu_naa, LuIdentifier};
pub use source::{SysfsVpdSource, SysfsVpdSourceBuilder, VpdPageSource};
pub use vpd::{descriptors, Descriptor, DescriptorIter, Vpd83Page};

/// Version of this library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_package_metadata() {
        assert_eq!(env!("CARGO_PKG_NAME"), "sasutils");
        assert!(env!("CARGO_PKG_AUTHORS").is_empty());
        assert!(env!("CARGO_PKG_REPOSITORY").is_empty());
        assert!(!super::VERSION.is_empty());
    }
}
