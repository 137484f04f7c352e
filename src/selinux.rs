//! SELinux is treated as an opaque external collaborator: this crate never
//! links against `libselinux` directly, it only defines the seam a host
//! embedding this crate can plug a real security-context lookup into.

use crate::mode::Mode;

/// Looks up and applies SELinux security contexts for device nodes and
/// sysfs attributes.
///
/// A real implementation wraps `selabel_lookup`/`setfscreatecon`/
/// `setfilecon` from `libselinux`; this crate ships only [`NullSeLabeler`],
/// which makes every lookup a no-op so the crate builds and runs on
/// systems without SELinux.
pub trait SeLabeler {
    /// Looks up the security context that should be set (via
    /// `setfscreatecon`) before creating `path` with the given `mode`.
    ///
    /// Returns `None` when no policy entry applies, or the labeler is a
    /// no-op.
    fn lookup(&self, path: &str, mode: Mode) -> Option<String>;

    /// Applies `context` directly to an already-existing path, as used by
    /// the sysfs-attribute fixup pass (`setfilecon`).
    fn apply(&self, _path: &str, _context: &str) {}
}

/// A [SeLabeler] that never produces a context. Used when the embedding
/// host has no SELinux policy to enforce.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSeLabeler;

impl SeLabeler for NullSeLabeler {
    fn lookup(&self, _path: &str, _mode: Mode) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_se_labeler() {
        let labeler = NullSeLabeler;
        assert_eq!(labeler.lookup("/dev/null", Mode::create(0o666)), None);
    }
}
