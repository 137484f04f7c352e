//! Ties together the rule tables, platform registry, module autoloader,
//! and netlink receiver behind a single process-scoped context — this
//! crate has no other mutable global state.

use std::fmt;

use crate::{
    autoload::ModuleAutoloader,
    coldboot,
    firmware,
    log::LogPriority,
    netlink::NetlinkReceiver,
    platform::PlatformRegistry,
    router::{self, DeviceNotifySink},
    rules::RuleTable,
    selinux::{NullSeLabeler, SeLabeler},
    uevent::Uevent,
    Result,
};

/// Owns every piece of mutable state this crate needs across the lifetime
/// of the process: rule tables, the platform-device registry, the module
/// deferral queue, and the netlink socket.
///
/// Deliberately not `Clone`/`Send`/`Sync` — the original implementation's
/// reliance on several independent global linked lists becomes, here, one
/// struct a single event loop owns and threads through by `&mut self`.
/// There is no internal locking because there is no internal concurrency.
pub struct UeventdContext {
    rules: RuleTable,
    platform: PlatformRegistry,
    autoloader: ModuleAutoloader,
    labeler: Box<dyn SeLabeler>,
    netlink: Option<NetlinkReceiver>,
    log_priority: LogPriority,
}

impl UeventdContext {
    /// Creates a context with an empty rule set and [`NullSeLabeler`].
    /// Call [`Self::with_selinux`] to install a real labeler, and
    /// [`Self::init`] to open the netlink socket and run coldboot.
    pub fn new() -> Self {
        Self {
            rules: RuleTable::new(),
            platform: PlatformRegistry::new(),
            autoloader: ModuleAutoloader::new(),
            labeler: Box::new(NullSeLabeler),
            netlink: None,
            log_priority: LogPriority::new(),
        }
    }

    /// Installs a real SELinux labeler, replacing the default no-op one.
    pub fn with_selinux(mut self, labeler: impl SeLabeler + 'static) -> Self {
        self.labeler = Box::new(labeler);
        self
    }

    /// Gets the log priority gate.
    pub const fn log_priority(&self) -> LogPriority {
        self.log_priority
    }

    /// Sets the log priority gate.
    pub fn set_log_priority<P: Into<LogPriority>>(&mut self, priority: P) {
        self.log_priority = priority.into();
    }

    /// Builder function that sets the log priority gate.
    pub fn with_log_priority<P: Into<LogPriority>>(mut self, priority: P) -> Self {
        self.set_log_priority(priority);
        self
    }

    /// Convenience function for `ueventd` log messages, gated by
    /// [`LogPriority`] exactly as the teacher's `Udev::log` gates priority
    /// before dispatch.
    pub fn log<M: fmt::Display>(&self, priority: LogPriority, msg: M) {
        if priority <= self.log_priority {
            match priority {
                LogPriority::Emergency | LogPriority::Alert | LogPriority::Critical | LogPriority::Error => {
                    log::error!("{priority}: {msg}")
                }
                LogPriority::Warning => log::warn!("{priority}: {msg}"),
                LogPriority::Notice | LogPriority::Info => log::info!("{priority}: {msg}"),
                LogPriority::Debug => log::debug!("{priority}: {msg}"),
            }
        }
    }

    /// Gets a mutable reference to the device-permission/sysfs-permission/
    /// USB-class rule tables, for rule-file ingestion at startup.
    pub fn rules_mut(&mut self) -> &mut RuleTable {
        &mut self.rules
    }

    /// Gets a mutable reference to the module autoloader, for registering
    /// blacklist entries at startup.
    pub fn autoloader_mut(&mut self) -> &mut ModuleAutoloader {
        &mut self.autoloader
    }

    /// Opens the netlink uevent socket and runs coldboot if it hasn't run
    /// yet this boot, matching `device_init`'s init order: the SELinux
    /// handle is expected to already be installed via
    /// [`Self::with_selinux`] before calling this, the netlink socket opens
    /// next, and coldboot (which depends on the socket for its
    /// drain-between-pokes behavior) runs last.
    pub fn init(
        &mut self,
        resolver: &mut dyn crate::autoload::ModuleResolver,
        notify: Option<DeviceNotifySink<'_>>,
    ) -> Result<()> {
        let netlink = NetlinkReceiver::open()?;

        coldboot::run_if_needed(&netlink, |event| {
            self.handle_event(event, resolver, notify);
        });

        self.netlink = Some(netlink);
        Ok(())
    }

    /// Drains every uevent currently queued on the netlink socket,
    /// dispatching each to the appropriate subsystem handler.
    ///
    /// A no-op if [`Self::init`] hasn't been called yet.
    pub fn pump(&mut self, resolver: &mut dyn crate::autoload::ModuleResolver, notify: Option<DeviceNotifySink<'_>>) {
        let Some(netlink) = self.netlink.take() else {
            log::warn!("pump() called before init()");
            return;
        };

        netlink.drain(|event| {
            self.handle_event(event, resolver, notify);
        });

        self.netlink = Some(netlink);
    }

    /// Dispatches a single already-parsed uevent, matching
    /// `handle_device_event`'s ordering: module autoload on `add`, sysfs
    /// permission fixup on `add`/`change`, then subsystem-specific
    /// handling. `firmware`-subsystem events are routed to the firmware
    /// pump instead of the generic device handler — the original
    /// implementation's caller made this same subsystem-based split
    /// between `handle_device_event` and `handle_firmware_event`.
    ///
    /// Exposed as the single entry point an embedder drives directly
    /// (e.g. from its own test harness, or from a non-netlink event
    /// source); [`Self::init`] and [`Self::pump`] are thin wrappers
    /// around it for the netlink-socket-driven case.
    pub fn handle_event(
        &mut self,
        event: &Uevent<'_>,
        resolver: &mut dyn crate::autoload::ModuleResolver,
        notify: Option<DeviceNotifySink<'_>>,
    ) {
        if event.action == "add" {
            self.autoloader.handle_modalias(event.modalias, resolver);
        }

        if event.action == "add" || event.action == "change" {
            router::fixup_sys_perms(&self.rules, self.labeler.as_ref(), event.path);
        }

        if event.subsystem == "firmware" {
            firmware::handle_firmware_event(event);
        } else if event.subsystem.starts_with("block") {
            router::handle_block_device_event(&self.platform, &self.rules, self.labeler.as_ref(), notify, event);
        } else if event.subsystem.starts_with("platform") {
            router::handle_platform_device_event(&mut self.platform, event);
        } else {
            router::handle_generic_device_event(&self.platform, &self.rules, self.labeler.as_ref(), notify, event);
        }
    }
}

impl Default for UeventdContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{autoload::ModuleLoadResult, mode::Mode};

    struct AlwaysOkResolver;
    impl crate::autoload::ModuleResolver for AlwaysOkResolver {
        fn resolve(&mut self, _modalias: &str, _blacklist: Option<&std::collections::HashSet<String>>) -> ModuleLoadResult {
            ModuleLoadResult::empty()
        }
    }

    #[test]
    fn test_new_context_has_empty_rule_table() {
        let mut ctx = UeventdContext::new();
        let (perm, uid, gid) = ctx.rules_mut().lookup_dev_perm("/dev/null");
        assert_eq!(perm, Mode::from_octal_str("0600").unwrap());
        assert_eq!(uid, 0);
        assert_eq!(gid, 0);
    }

    #[test]
    fn test_log_priority_defaults_and_builder() {
        let ctx = UeventdContext::new();
        assert_eq!(ctx.log_priority(), crate::log::LogPriority::new());

        let ctx = ctx.with_log_priority(crate::log::LogPriority::Debug);
        assert_eq!(ctx.log_priority(), crate::log::LogPriority::Debug);
    }

    #[test]
    fn test_log_gates_on_priority() {
        // priority ordering only; `log()`'s dispatch side effect isn't
        // itself observable without a log-capture harness, but the gate
        // comparison it relies on is exercised directly here.
        let ctx = UeventdContext::new().with_log_priority(crate::log::LogPriority::Error);
        assert!(crate::log::LogPriority::Error <= ctx.log_priority());
        assert!(!(crate::log::LogPriority::Debug <= ctx.log_priority()));

        ctx.log(crate::log::LogPriority::Error, "gated through");
        ctx.log(crate::log::LogPriority::Debug, "filtered out");
    }

    #[test]
    fn test_dispatch_platform_add_tracks_registry() {
        let mut ctx = UeventdContext::new();
        let mut resolver = AlwaysOkResolver;

        let event = Uevent {
            action: "add",
            path: "/devices/platform/soc/7824900.sdhci",
            subsystem: "platform",
            major: -1,
            minor: -1,
            partition_num: -1,
            ..Uevent::default()
        };

        ctx.handle_event(&event, &mut resolver, None);
        assert!(ctx
            .platform
            .find("/devices/platform/soc/7824900.sdhci/mmc_host/mmc0")
            .is_some());
    }

    #[test]
    fn test_dispatch_add_runs_autoload() {
        let mut ctx = UeventdContext::new();
        let mut resolver = AlwaysOkResolver;

        let event = Uevent {
            action: "add",
            path: "/devices/virtual/misc/foo",
            subsystem: "misc",
            modalias: "platform:foo",
            major: -1,
            minor: -1,
            partition_num: -1,
            ..Uevent::default()
        };

        ctx.handle_event(&event, &mut resolver, None);
        assert_eq!(ctx.autoloader.deferred_len(), 0);
    }
}
