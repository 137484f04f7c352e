//! Parses a kernel uevent message into a structured, buffer-borrowed
//! record.

use crate::{Error, Result};

/// Kernel-documented maximum uevent message length.
///
/// Messages at or above this length are the kernel's own overflow
/// signal and are discarded rather than parsed.
pub const UEVENT_MSG_LEN: usize = 1024;

/// A parsed kernel uevent.
///
/// String fields borrow from the receive buffer passed to [`Uevent::parse`]
/// — the event's lifetime is strictly nested inside that buffer's, and no
/// field is expected to outlive a single `handle_event` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Uevent<'a> {
    pub action: &'a str,
    pub path: &'a str,
    pub subsystem: &'a str,
    pub firmware: &'a str,
    pub partition_name: &'a str,
    pub device_name: &'a str,
    pub modalias: &'a str,
    pub product: &'a str,
    pub devtype: &'a str,
    pub partition_num: i32,
    pub major: i32,
    pub minor: i32,
}

impl<'a> Uevent<'a> {
    /// Parses a NUL-delimited `KEY=value` message into a [Uevent].
    ///
    /// The first token (`ACTION@DEVPATH`) is not itself a `KEY=value` pair
    /// and is skipped. `SEQNUM` and any unrecognized key are silently
    /// ignored, matching the kernel-documented uevent wire format.
    ///
    /// Returns `Err` if `buf` is at or over [`UEVENT_MSG_LEN`] — the
    /// kernel's own overflow signal for a truncated message.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        if buf.len() >= UEVENT_MSG_LEN {
            return Err(Error::InvalidLen(buf.len()));
        }

        let mut event = Self {
            major: -1,
            minor: -1,
            partition_num: -1,
            ..Self::default()
        };

        for (i, token) in buf.split(|&b| b == 0).enumerate() {
            if token.is_empty() {
                continue;
            }
            // the first token is `ACTION@DEVPATH`, not a KEY=value pair
            if i == 0 {
                continue;
            }

            let Ok(tok) = std::str::from_utf8(token) else {
                continue;
            };

            if let Some(v) = tok.strip_prefix("ACTION=") {
                event.action = v;
            } else if let Some(v) = tok.strip_prefix("DEVPATH=") {
                event.path = v;
            } else if let Some(v) = tok.strip_prefix("SUBSYSTEM=") {
                event.subsystem = v;
            } else if let Some(v) = tok.strip_prefix("FIRMWARE=") {
                event.firmware = v;
            } else if let Some(v) = tok.strip_prefix("MAJOR=") {
                event.major = v.parse().unwrap_or(-1);
            } else if let Some(v) = tok.strip_prefix("MINOR=") {
                event.minor = v.parse().unwrap_or(-1);
            } else if let Some(v) = tok.strip_prefix("PARTN=") {
                event.partition_num = v.parse().unwrap_or(-1);
            } else if let Some(v) = tok.strip_prefix("PARTNAME=") {
                event.partition_name = v;
            } else if let Some(v) = tok.strip_prefix("DEVNAME=") {
                event.device_name = v;
            } else if let Some(v) = tok.strip_prefix("TYPE=") {
                event.devtype = v;
            } else if let Some(v) = tok.strip_prefix("MODALIAS=") {
                event.modalias = v;
            } else if let Some(v) = tok.strip_prefix("PRODUCT=") {
                event.product = v;
            }
            // SEQNUM and anything else is silently ignored
        }

        Ok(event)
    }

    /// Gets whether the event carries a usable device number.
    pub const fn has_devnum(&self) -> bool {
        self.major >= 0 && self.minor >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(tokens: &[&str]) -> Vec<u8> {
        let mut buf = tokens.join("\0").into_bytes();
        buf.push(0);
        buf.push(0);
        buf
    }

    #[test]
    fn test_parse_basic() {
        let buf = msg(&[
            "add@/devices/platform/sdhci/mmcblk0p1",
            "ACTION=add",
            "DEVPATH=/devices/platform/sdhci/mmcblk0p1",
            "SUBSYSTEM=block",
            "MAJOR=179",
            "MINOR=1",
            "PARTN=1",
            "PARTNAME=system",
        ]);

        let event = Uevent::parse(&buf).unwrap();
        assert_eq!(event.action, "add");
        assert_eq!(event.path, "/devices/platform/sdhci/mmcblk0p1");
        assert_eq!(event.subsystem, "block");
        assert_eq!(event.major, 179);
        assert_eq!(event.minor, 1);
        assert_eq!(event.partition_num, 1);
        assert_eq!(event.partition_name, "system");
        assert!(event.has_devnum());
    }

    #[test]
    fn test_defaults_absent_fields() {
        let buf = msg(&["add@/x", "ACTION=add", "DEVPATH=/x"]);
        let event = Uevent::parse(&buf).unwrap();
        assert_eq!(event.major, -1);
        assert_eq!(event.minor, -1);
        assert_eq!(event.partition_num, -1);
        assert_eq!(event.modalias, "");
        assert!(!event.has_devnum());
    }

    #[test]
    fn test_seqnum_and_unknown_keys_ignored() {
        let buf = msg(&[
            "add@/x",
            "ACTION=add",
            "DEVPATH=/x",
            "SEQNUM=12345",
            "SOME_FUTURE_KEY=whatever",
        ]);
        let event = Uevent::parse(&buf).unwrap();
        assert_eq!(event.action, "add");
        assert_eq!(event.path, "/x");
    }

    #[test]
    fn test_overflow_discarded() {
        let buf = vec![b'A'; UEVENT_MSG_LEN];
        assert_eq!(Uevent::parse(&buf), Err(Error::InvalidLen(UEVENT_MSG_LEN)));
    }

    #[test]
    fn test_round_trip() {
        let buf = msg(&[
            "add@/devices/virtual/firmware/foo",
            "ACTION=add",
            "DEVPATH=/devices/virtual/firmware/foo",
            "SUBSYSTEM=firmware",
            "FIRMWARE=iwlwifi.ucode",
        ]);
        let event = Uevent::parse(&buf).unwrap();

        let reserialized = msg(&[
            "add@/devices/virtual/firmware/foo",
            &format!("ACTION={}", event.action),
            &format!("DEVPATH={}", event.path),
            &format!("SUBSYSTEM={}", event.subsystem),
            &format!("FIRMWARE={}", event.firmware),
        ]);
        let reparsed = Uevent::parse(&reserialized).unwrap();

        assert_eq!(event, reparsed);
    }
}
