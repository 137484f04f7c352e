//! Device-permission, sysfs-attribute, and USB device-class rule tables.
//!
//! Mirrors the original implementation's three rule lists, but as
//! contiguous `Vec`s of owned records instead of a linked list of heap
//! nodes — reverse iteration becomes reverse indexing, and there is no
//! per-node allocation to manage.

use glob::Pattern;

use crate::{mode::Mode, Result};

/// A name or glob pattern to match against a device or sysfs path.
#[derive(Clone, Debug)]
enum NameMatch {
    Literal(String),
    Glob(Pattern),
}

impl NameMatch {
    fn new(name: &str, wildcard: bool) -> Result<Self> {
        Ok(if wildcard {
            Self::Glob(Pattern::new(name)?)
        } else {
            Self::Literal(name.to_owned())
        })
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Literal(name) => name == candidate,
            Self::Glob(pattern) => pattern.matches(candidate),
        }
    }
}

/// A single `/dev/<name>` ownership-and-mode rule.
#[derive(Clone, Debug)]
pub struct DevPermRule {
    name: NameMatch,
    pub perm: Mode,
    pub uid: u32,
    pub gid: u32,
}

/// A single sysfs-attribute ownership-and-mode rule.
///
/// `name` matches against the device path with the leading `/sys` stripped,
/// per the original implementation's convention.
#[derive(Clone, Debug)]
pub struct SysPermRule {
    name: NameMatch,
    pub attr: String,
    pub perm: Mode,
    pub uid: u32,
    pub gid: u32,
}

/// A USB device-class ownership, mode, and autosuspend policy rule.
#[derive(Clone, Debug, Default)]
pub struct UsbClassRule {
    devclass: Option<Pattern>,
    pub perm: Mode,
    pub uid: u32,
    pub gid: u32,
    pub pwr_ctrl_auto: bool,
    pub pwr_ctrl_on: bool,
    pub pwr_ctrl_perm: bool,
}

impl UsbClassRule {
    fn matches(&self, devtype: &str) -> bool {
        self.devclass
            .as_ref()
            .is_some_and(|pattern| pattern.matches(devtype))
    }
}

/// Owns the device-permission, sysfs-permission, and USB device-class
/// tables, plus the lookup/application logic over them.
#[derive(Default)]
pub struct RuleTable {
    dev_perms: Vec<DevPermRule>,
    sys_perms: Vec<SysPermRule>,
    usb_classes: Vec<UsbClassRule>,
}

impl RuleTable {
    /// Creates an empty [RuleTable].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `/dev/<name>` ownership rule.
    pub fn add_dev_perm(
        &mut self,
        name: &str,
        perm: Mode,
        uid: u32,
        gid: u32,
        wildcard: bool,
    ) -> Result<()> {
        self.dev_perms.push(DevPermRule {
            name: NameMatch::new(name, wildcard)?,
            perm,
            uid,
            gid,
        });
        Ok(())
    }

    /// Registers a sysfs-attribute ownership rule.
    pub fn add_sys_perm(
        &mut self,
        name: &str,
        attr: &str,
        perm: Mode,
        uid: u32,
        gid: u32,
        wildcard: bool,
    ) -> Result<()> {
        self.sys_perms.push(SysPermRule {
            name: NameMatch::new(name, wildcard)?,
            attr: attr.to_owned(),
            perm,
            uid,
            gid,
        });
        Ok(())
    }

    /// Registers a USB device-class rule. `options` is a free-form,
    /// whitespace-separated token list; `suspend_auto`, `suspend_on`, and
    /// `pwr_ctrl_perm` are recognized as substrings, matching the original
    /// implementation's loose `strstr` parsing.
    pub fn add_usb_class(
        &mut self,
        devclass: &str,
        perm: Mode,
        uid: u32,
        gid: u32,
        options: &str,
    ) -> Result<()> {
        let mut rule = UsbClassRule {
            devclass: Some(Pattern::new(devclass)?),
            perm,
            uid,
            gid,
            ..Default::default()
        };

        if options.contains("suspend_auto") {
            rule.pwr_ctrl_auto = true;
            rule.pwr_ctrl_on = false;
        }
        if options.contains("suspend_on") {
            rule.pwr_ctrl_auto = false;
            rule.pwr_ctrl_on = true;
        }
        if options.contains("pwr_ctrl_perm") {
            rule.pwr_ctrl_perm = true;
        }

        self.usb_classes.push(rule);
        Ok(())
    }

    /// Looks up the mode/uid/gid for a `/dev` path, searching rules in
    /// reverse registration order so that a later (e.g. hardware-specific)
    /// rule file overrides an earlier default one.
    ///
    /// Defaults to mode `0600`, uid 0, gid 0 when nothing matches.
    pub fn lookup_dev_perm(&self, path: &str) -> (Mode, u32, u32) {
        self.dev_perms
            .iter()
            .rev()
            .find(|rule| rule.name.matches(path))
            .map(|rule| (rule.perm, rule.uid, rule.gid))
            .unwrap_or((Mode::from_octal_str("0600").unwrap_or_default(), 0, 0))
    }

    /// Returns every sysfs-permission rule whose name matches `path` (the
    /// device path with the leading `/sys` stripped), in registration
    /// order — unlike device-node lookup, all matching sysfs rules apply,
    /// not just the last one.
    pub fn matching_sys_perms(&self, path: &str) -> impl Iterator<Item = &SysPermRule> {
        self.sys_perms.iter().filter(move |rule| rule.name.matches(path))
    }

    /// Returns the first USB device-class rule whose glob matches `devtype`.
    pub fn find_usb_class(&self, devtype: &str) -> Option<&UsbClassRule> {
        self.usb_classes.iter().find(|rule| rule.matches(devtype))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_perm_override_order() {
        let mut table = RuleTable::new();
        table
            .add_dev_perm("/dev/null", Mode::create(0o666), 0, 0, false)
            .unwrap();
        table
            .add_dev_perm("/dev/null", Mode::create(0o660), 0, 1000, false)
            .unwrap();

        let (perm, uid, gid) = table.lookup_dev_perm("/dev/null");
        assert_eq!(perm.bits(), 0o660);
        assert_eq!(uid, 0);
        assert_eq!(gid, 1000);
    }

    #[test]
    fn test_dev_perm_default() {
        let table = RuleTable::new();
        let (perm, uid, gid) = table.lookup_dev_perm("/dev/unknown");
        assert_eq!(perm.bits(), 0o600);
        assert_eq!(uid, 0);
        assert_eq!(gid, 0);
    }

    #[test]
    fn test_dev_perm_wildcard() {
        let mut table = RuleTable::new();
        table
            .add_dev_perm("/dev/input/event*", Mode::create(0o660), 0, 1001, true)
            .unwrap();

        let (perm, _, gid) = table.lookup_dev_perm("/dev/input/event3");
        assert_eq!(perm.bits(), 0o660);
        assert_eq!(gid, 1001);
    }

    #[test]
    fn test_sys_perms_all_matches_apply() {
        let mut table = RuleTable::new();
        table
            .add_sys_perm("/devices/platform/*", "wake_lock", Mode::create(0o660), 0, 1000, true)
            .unwrap();
        table
            .add_sys_perm("/devices/platform/*", "enable", Mode::create(0o664), 0, 1000, true)
            .unwrap();

        let matches: Vec<_> = table
            .matching_sys_perms("/devices/platform/sdhci")
            .collect();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_usb_class_options() {
        let mut table = RuleTable::new();
        table
            .add_usb_class("usb_device", Mode::create(0o664), 0, 1000, "suspend_auto pwr_ctrl_perm")
            .unwrap();

        let rule = table.find_usb_class("usb_device").unwrap();
        assert!(rule.pwr_ctrl_auto);
        assert!(!rule.pwr_ctrl_on);
        assert!(rule.pwr_ctrl_perm);
    }
}
