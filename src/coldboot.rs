//! Regenerates `add` uevents for devices that appeared before this crate's
//! netlink receiver was listening, by walking sysfs and poking each
//! `uevent` attribute file.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{netlink::NetlinkReceiver, Uevent};

/// Marker file recording that coldboot has already run once; present on
/// every boot after the first.
pub const COLDBOOT_DONE: &str = "/dev/.coldboot_done";

/// Recursively collects every `uevent` attribute file under `dir`, in the
/// depth-first, parent-before-children order they should be poked in.
/// Skips dotfile directories and anything unreadable, matching the
/// original implementation's `do_coldboot` traversal.
fn collect_uevent_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();

    let uevent_path = dir.join("uevent");
    if uevent_path.is_file() {
        found.push(uevent_path);
    }

    let Ok(entries) = fs::read_dir(dir) else {
        return found;
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        found.extend(collect_uevent_files(&entry.path()));
    }

    found
}

/// Walks `path`, writing `add\n` to every `uevent` file found below it and
/// draining `netlink` after each poke so the kernel's regenerated events
/// don't overflow the socket buffer before coldboot finishes walking the
/// tree. A missing `path` contributes nothing — not every sysfs class
/// directory exists on every kernel.
pub fn coldboot(path: &str, netlink: &NetlinkReceiver, mut handler: impl FnMut(&Uevent<'_>)) {
    for uevent_path in collect_uevent_files(Path::new(path)) {
        if let Ok(mut file) = File::options().write(true).open(&uevent_path) {
            let _ = file.write_all(b"add\n");
            netlink.drain(&mut handler);
        }
    }
}

/// Gets whether coldboot has already completed on this boot.
pub fn is_done() -> bool {
    Path::new(COLDBOOT_DONE).exists()
}

/// Marks coldboot as complete for the remainder of this boot.
pub fn mark_done() {
    if let Err(err) = File::create(COLDBOOT_DONE) {
        log::warn!("failed to create {COLDBOOT_DONE}: {err}");
    }
}

/// Runs coldboot over the three sysfs roots the original implementation
/// walks, unless [`is_done`] already holds.
pub fn run_if_needed(netlink: &NetlinkReceiver, mut handler: impl FnMut(&Uevent<'_>)) {
    if is_done() {
        log::info!("skipping coldboot, already done");
        return;
    }

    coldboot("/sys/class", netlink, &mut handler);
    coldboot("/sys/block", netlink, &mut handler);
    coldboot("/sys/devices", netlink, &mut handler);
    mark_done();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_uevent_files_skips_dotfiles() {
        let dir = std::env::temp_dir().join(format!("ueventd-coldboot-test-{}", std::process::id()));
        fs::create_dir_all(dir.join(".hidden")).unwrap();
        fs::create_dir_all(dir.join("visible/child")).unwrap();
        fs::write(dir.join(".hidden/uevent"), "").unwrap();
        fs::write(dir.join("visible/uevent"), "").unwrap();
        fs::write(dir.join("visible/child/uevent"), "").unwrap();

        let found = collect_uevent_files(&dir);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| !p.to_string_lossy().contains(".hidden")));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_collect_uevent_files_missing_dir() {
        let missing = Path::new("/nonexistent/ueventd/coldboot/path");
        assert!(collect_uevent_files(missing).is_empty());
    }

    #[test]
    fn test_is_done_reflects_marker_absence_or_presence() {
        let _ = is_done();
    }
}
