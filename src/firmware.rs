//! Services `firmware` subsystem uevents by streaming a firmware blob from
//! one of a few well-known directories into the kernel's sysfs handshake.

use std::{
    fs::File,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use crate::{Error, Result, Uevent};

/// Search roots tried in order for a firmware file, matching
/// `FIRMWARE_DIR1`/`FIRMWARE_DIR2`/`FIRMWARE_DIR3`.
pub const FIRMWARE_DIRS: [&str; 3] = ["/etc/firmware", "/vendor/firmware", "/firmware/image"];

/// Sysfs mount point the device's `loading`/`data` handshake files hang
/// off of.
pub const SYSFS_PREFIX: &str = "/sys";

/// Sentinel file whose presence means the system is still booting — used
/// to decide whether a missing firmware file is worth retrying (the
/// backing filesystem may not be mounted yet) or a permanent failure.
pub const BOOTING_SENTINEL: &str = "/dev/.booting";

/// Interval between retries while `is_booting()` holds.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Streaming chunk size. 4 KiB matches the common Linux `PAGE_SIZE`; unlike
/// the original implementation this isn't read from `sysconf`, since the
/// chunk size has no correctness bearing, only throughput.
const CHUNK_SIZE: usize = 4096;

fn is_booting() -> bool {
    Path::new(BOOTING_SENTINEL).exists()
}

/// Streams `fw_file`'s full contents into `data`, bracketed by the
/// `loading` handshake writes (`"1"` to start, `"0"` on success, `"-1"` on
/// any I/O error), matching `load_firmware`.
fn load_firmware(fw_file: &mut File, loading: &mut File, data: &mut File) -> io::Result<()> {
    loading.write_all(b"1")?;

    let result = (|| -> io::Result<()> {
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = fw_file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            data.write_all(&buf[..n])?;
        }
        Ok(())
    })();

    match &result {
        Ok(()) => loading.write_all(b"0")?,
        Err(_) => loading.write_all(b"-1")?,
    }

    result
}

/// Opens the first of [`FIRMWARE_DIRS`] that contains `firmware`, blocking
/// and retrying every [`RETRY_INTERVAL`] while [`is_booting`] holds true —
/// the backing filesystem for firmware files may not be mounted yet this
/// early in boot.
///
/// Synchronous by design: unlike the original implementation (which forks
/// a helper to avoid blocking `init`'s main loop), this crate's single
/// event loop has nothing else to service while firmware is pending, so
/// there is no benefit to forking and every reason to keep the simpler
/// synchronous path.
fn open_firmware_file(firmware: &str) -> Option<File> {
    loop {
        for dir in FIRMWARE_DIRS {
            let path = PathBuf::from(dir).join(firmware);
            if let Ok(file) = File::open(&path) {
                return Some(file);
            }
        }

        if is_booting() {
            thread::sleep(RETRY_INTERVAL);
            continue;
        }

        return None;
    }
}

/// Handles a single `firmware`-subsystem `add` event: opens the `loading`
/// and `data` sysfs handshake files under the event's devpath and streams
/// the requested firmware file into them.
pub fn process_firmware_event(event: &Uevent<'_>) -> Result<()> {
    let root = format!("{SYSFS_PREFIX}{}/", event.path);
    log::info!("firmware: loading '{}' for '{}'", event.firmware, event.path);

    let mut loading = File::options()
        .write(true)
        .open(format!("{root}loading"))
        .map_err(|err| Error::Firmware(format!("open {root}loading: {err}")))?;
    let mut data = File::options()
        .write(true)
        .open(format!("{root}data"))
        .map_err(|err| Error::Firmware(format!("open {root}data: {err}")))?;

    let Some(mut fw_file) = open_firmware_file(event.firmware) else {
        log::info!("firmware: could not open '{}'", event.firmware);
        let _ = loading.write_all(b"-1");
        return Ok(());
    };

    match load_firmware(&mut fw_file, &mut loading, &mut data) {
        Ok(()) => log::info!("firmware: copy success {{ '{root}', '{}' }}", event.firmware),
        Err(err) => log::info!("firmware: copy failure {{ '{root}', '{}' }}: {err}", event.firmware),
    }

    Ok(())
}

/// Dispatches a `firmware`-subsystem event, ignoring anything but an `add`.
pub fn handle_firmware_event(event: &Uevent<'_>) {
    if event.subsystem != "firmware" || event.action != "add" {
        return;
    }

    if let Err(err) = process_firmware_event(event) {
        log::error!("{err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Opens `name` under a per-test scratch directory for read+write,
    /// creating it (truncated) if absent.
    fn scratch_file(dir: &Path, name: &str, contents: &[u8]) -> File {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        File::options().read(true).write(true).open(&path).unwrap()
    }

    #[test]
    fn test_load_firmware_success_sequence() {
        let dir = std::env::temp_dir().join(format!("ueventd-fw-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut fw_file = scratch_file(&dir, "fw.bin", b"firmware-bytes");
        let mut loading = scratch_file(&dir, "loading", b"");
        let mut data = scratch_file(&dir, "data", b"");

        load_firmware(&mut fw_file, &mut loading, &mut data).unwrap();

        assert_eq!(std::fs::read(dir.join("loading")).unwrap(), b"10");
        assert_eq!(std::fs::read(dir.join("data")).unwrap(), b"firmware-bytes");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_handle_firmware_event_ignores_non_add() {
        let event = Uevent {
            subsystem: "firmware",
            action: "remove",
            firmware: "x.bin",
            ..Uevent::default()
        };
        // should return immediately without attempting any sysfs I/O
        handle_firmware_event(&event);
    }

    #[test]
    fn test_handle_firmware_event_ignores_other_subsystems() {
        let event = Uevent {
            subsystem: "block",
            action: "add",
            firmware: "x.bin",
            ..Uevent::default()
        };
        handle_firmware_event(&event);
    }
}
