//! Tracks platform bus devices so their subdevices can be recognized and
//! linked under `/dev/block/platform/<name>` or `/dev/usb/<subsystem><n>`.

/// A registered platform device.
#[derive(Clone, Debug)]
struct PlatformNode {
    /// Full sysfs devpath, e.g. `/devices/platform/soc/7824900.sdhci`.
    path: String,
    /// `path` with the leading `/devices/` and optional `platform/`
    /// stripped, used as the `by-name` link component.
    name: String,
}

/// Ordered registry of platform devices, most-recently-added last.
///
/// Searches run most-recent-first (reverse order), matching the original
/// implementation's `list_for_each_reverse` traversal.
#[derive(Default)]
pub struct PlatformRegistry {
    nodes: Vec<PlatformNode>,
}

impl PlatformRegistry {
    /// Creates an empty [PlatformRegistry].
    pub fn new() -> Self {
        Self::default()
    }

    fn canonical_name(path: &str) -> &str {
        let name = path.strip_prefix("/devices/").unwrap_or(path);
        name.strip_prefix("platform/").unwrap_or(name)
    }

    /// Registers `path` as a platform device, unless it is a subdevice of
    /// an already-registered platform device (in which case it is silently
    /// ignored — only the top-level bus device is tracked).
    pub fn add(&mut self, path: &str) {
        let path_len = path.len();

        let is_subdevice = self.nodes.iter().rev().any(|bus| {
            bus.path.len() < path_len
                && path.as_bytes()[bus.path.len()] == b'/'
                && path.starts_with(bus.path.as_str())
        });

        if is_subdevice {
            return;
        }

        let name = Self::canonical_name(path).to_owned();
        log::info!("adding platform device {name} ({path})");

        self.nodes.push(PlatformNode {
            path: path.to_owned(),
            name,
        });
    }

    /// Removes the platform device registered at exactly `path`.
    pub fn remove(&mut self, path: &str) {
        if let Some(pos) = self.nodes.iter().rposition(|bus| bus.path == path) {
            let removed = self.nodes.remove(pos);
            log::info!("removing platform device {}", removed.name);
        }
    }

    /// Finds the platform device that is a prefix of `path` — i.e. `path`
    /// names a subdevice (or the device itself, with a trailing path
    /// component) of a registered platform bus.
    ///
    /// No registered device path is ever a prefix of another (callers only
    /// add top-level devices via [`Self::add`]), so the most-recent match
    /// is the only possible match.
    pub fn find(&self, path: &str) -> Option<(&str, &str)> {
        let path_len = path.len();
        self.nodes
            .iter()
            .rev()
            .find(|bus| {
                bus.path.len() < path_len
                    && path.as_bytes()[bus.path.len()] == b'/'
                    && path.starts_with(bus.path.as_str())
            })
            .map(|bus| (bus.path.as_str(), bus.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let mut registry = PlatformRegistry::new();
        registry.add("/devices/platform/soc/7824900.sdhci");

        let (path, name) = registry
            .find("/devices/platform/soc/7824900.sdhci/mmc_host/mmc0")
            .unwrap();
        assert_eq!(path, "/devices/platform/soc/7824900.sdhci");
        assert_eq!(name, "soc/7824900.sdhci");
    }

    #[test]
    fn test_subdevice_suppressed() {
        let mut registry = PlatformRegistry::new();
        registry.add("/devices/platform/soc/7824900.sdhci");
        registry.add("/devices/platform/soc/7824900.sdhci/mmc_host/mmc0");

        // the subdevice add must have been ignored; only the bus is tracked
        assert!(registry.find("/devices/platform/soc/7824900.sdhci/mmc_host/mmc0/foo").is_some());
        assert_eq!(registry.nodes.len(), 1);
    }

    #[test]
    fn test_find_no_match() {
        let mut registry = PlatformRegistry::new();
        registry.add("/devices/platform/soc/7824900.sdhci");
        assert!(registry.find("/devices/virtual/foo").is_none());
    }

    #[test]
    fn test_remove() {
        let mut registry = PlatformRegistry::new();
        registry.add("/devices/platform/soc/7824900.sdhci");
        registry.remove("/devices/platform/soc/7824900.sdhci");
        assert!(registry.find("/devices/platform/soc/7824900.sdhci/mmc_host/mmc0").is_none());
    }
}
