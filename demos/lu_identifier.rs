//! Print the logical unit World-Wide Name of SAS block devices
//!
//! Usage: cargo run --example lu_identifier -- sda sdb ...
//!
//! Set SASUTILS_SYSFS_ROOT to read from a sysfs tree other than /sys.

use sasutils::{SysfsVpdSource, VpdPageSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let blkdevs: Vec<String> = std::env::args().skip(1).collect();
    if blkdevs.is_empty() {
        eprintln!("Usage: lu_identifier <blkdev>...");
        std::process::exit(1);
    }

    let source = SysfsVpdSource::builder().build()?;
    let mut failed = false;

    for blkdev in &blkdevs {
        match source.lu_identifier(blkdev) {
            Ok(Some(wwn)) => println!("{} {}", blkdev, wwn),
            Ok(None) => {
                eprintln!("Not found: {} has no logical unit NAA identifier", blkdev);
                failed = true;
            }
            Err(e) => {
                eprintln!("{}: {}", blkdev, e);
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
