//! Materializes and removes `/dev` nodes and their symlinks.

use std::{ffi, fs, io, os::unix::fs::symlink};

use crate::{mode::Mode, rules::RuleTable, selinux::SeLabeler, Error, Result};

// This crate has no real SELinux binding: `fscreatecontext_for` below only
// looks the context up, matching the original implementation's
// `setfscreatecon`/`mknod`/`setfscreatecon(NULL)` shape by handing the
// context to `labeler.apply` after the node exists instead.

/// RAII guard that restores the process's effective gid to `AID_ROOT` (0)
/// when dropped, regardless of which return path [`make_device`] takes.
///
/// The original implementation's `setegid`/`mknod`/`chown`/`setegid` dance
/// is itself the race mitigation: a literal goto-cleanup translation would
/// leave a window where an early return skips the restore. A `Drop` guard
/// makes that impossible to get wrong.
struct EgidGuard;

impl EgidGuard {
    /// Temporarily raises the effective gid to `gid`, returning a guard
    /// that restores it to root on drop.
    ///
    /// This is the race mitigation noted in the original: changing the
    /// euid would block creation of some device nodes, so only the egid is
    /// adjusted, and the uid is set afterwards via [`chown`] and remains
    /// racy.
    fn raise(gid: u32) -> Self {
        // SAFETY: `setegid` takes a plain gid_t and has no memory-safety
        // preconditions; failure is reported via errno, not UB.
        if unsafe { libc::setegid(gid) } != 0 {
            log::warn!("setegid({gid}) failed: {}", io::Error::last_os_error());
        }
        Self
    }
}

impl Drop for EgidGuard {
    fn drop(&mut self) {
        // SAFETY: see `raise`.
        if unsafe { libc::setegid(0) } != 0 {
            log::warn!("setegid(0) restore failed: {}", io::Error::last_os_error());
        }
    }
}

/// Looks up the creation context for `path`/`mode` from `labeler`. The
/// embedder's own `SeLabeler` impl is responsible for calling
/// `setfscreatecon` before returning and clearing it again once the node
/// this context was requested for has been created — this crate only
/// supplies the lookup-before/clear-after call shape via
/// [`SeLabeler::apply`].
fn fscreatecontext_for(labeler: &dyn SeLabeler, path: &str, mode: Mode) -> Option<String> {
    labeler.lookup(path, mode)
}

/// Creates `path` as a block or character device node with the mode/owner
/// resolved from `rules`, applying an SELinux creation context around the
/// `mknod` call.
///
/// `lookup_path` is the path used for permission-rule and SELinux-context
/// lookup (normally the same as `path`, but callers may pass a
/// rule-relative alias).
pub fn make_device(
    path: &str,
    lookup_path: &str,
    block: bool,
    major: u32,
    minor: u32,
    rules: &RuleTable,
    labeler: &dyn SeLabeler,
) -> Result<()> {
    let (perm, uid, gid) = rules.lookup_dev_perm(lookup_path);
    let file_type = if block { libc::S_IFBLK } else { libc::S_IFCHR };
    let mode = u32::from(perm) | file_type;

    let context = fscreatecontext_for(labeler, lookup_path, perm);

    let dev = libc::makedev(major, minor);
    let path_c = ffi::CString::new(path)?;

    // egid is raised for the duration of mknod + chown only; the guard
    // restores it to root even if mknod fails.
    let _egid_guard = EgidGuard::raise(gid);

    // SAFETY: `path_c` is a valid NUL-terminated string; `mode`/`dev` are
    // plain integers with no aliasing concerns.
    let ret = unsafe { libc::mknod(path_c.as_ptr(), mode, dev) };
    if ret != 0 {
        let errno = io::Error::last_os_error();
        if errno.kind() != io::ErrorKind::AlreadyExists {
            return Err(Error::DeviceNode(format!("mknod({path}) failed: {errno}")));
        }
    }

    // SAFETY: see above; `-1` for gid leaves the group unchanged by chown,
    // matching the original implementation (the group was already set via
    // the raised egid at mknod time).
    unsafe { libc::chown(path_c.as_ptr(), uid, u32::MAX) };

    if let Some(ctx) = context {
        labeler.apply(path, &ctx);
    }

    Ok(())
}

/// Removes a `/dev` node created by [`make_device`].
pub fn remove_device(path: &str) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::DeviceNode(format!("unlink({path}) failed: {err}"))),
    }
}

/// Creates a convenience symlink pointing at `target`, creating parent
/// directories as needed. An existing symlink at `link_path` is replaced
/// with one pointing at `target`, rather than left in place.
pub fn make_link(link_path: &str, target: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(link_path).parent() {
        fs::create_dir_all(parent)
            .map_err(|err| Error::DeviceNode(format!("mkdir({}) failed: {err}", parent.display())))?;
    }

    match symlink(target, link_path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            fs::remove_file(link_path).map_err(|err| {
                Error::DeviceNode(format!("unlink({link_path}) failed replacing stale symlink: {err}"))
            })?;
            symlink(target, link_path).map_err(|err| {
                Error::DeviceNode(format!("symlink({link_path} -> {target}) failed: {err}"))
            })
        }
        Err(err) => Err(Error::DeviceNode(format!(
            "symlink({link_path} -> {target}) failed: {err}"
        ))),
    }
}

/// Removes a symlink created by [`make_link`].
pub fn remove_link(link_path: &str, target: &str) -> Result<()> {
    match fs::read_link(link_path) {
        Ok(existing) if existing == std::path::Path::new(target) => {
            fs::remove_file(link_path)
                .map_err(|err| Error::DeviceNode(format!("unlink({link_path}) failed: {err}")))
        }
        // the link has already been replaced or removed, or points
        // elsewhere — leave it alone.
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selinux::NullSeLabeler;

    #[test]
    fn test_make_link_and_remove_link() {
        let dir = std::env::temp_dir().join(format!("ueventd-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let target = dir.join("target");
        fs::write(&target, b"x").unwrap();
        let link = dir.join("by-name").join("system");

        make_link(link.to_str().unwrap(), target.to_str().unwrap()).unwrap();
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());

        remove_link(link.to_str().unwrap(), target.to_str().unwrap()).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_make_link_replaces_stale_symlink() {
        let dir = std::env::temp_dir().join(format!("ueventd-test-stale-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let old_target = dir.join("old_target");
        let new_target = dir.join("new_target");
        fs::write(&old_target, b"old").unwrap();
        fs::write(&new_target, b"new").unwrap();
        let link = dir.join("mmcblk0p1");

        make_link(link.to_str().unwrap(), old_target.to_str().unwrap()).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), old_target);

        // a later event re-links the same name at a different target; the
        // stale symlink must be replaced, not left pointing at old_target.
        make_link(link.to_str().unwrap(), new_target.to_str().unwrap()).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), new_target);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_remove_device_missing_is_ok() {
        assert!(remove_device("/nonexistent/does/not/exist").is_ok());
    }

    #[test]
    fn test_fscreatecontext_noop_labeler() {
        let labeler = NullSeLabeler;
        let context = fscreatecontext_for(&labeler, "/dev/null", Mode::create(0o666));
        assert!(context.is_none());
    }
}
