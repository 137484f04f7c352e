//! Subsystem dispatch: turns a parsed [`Uevent`] into `/dev` node and
//! symlink materialization calls.

use std::fs;

use crate::{
    device_node, platform::PlatformRegistry, rules::RuleTable, selinux::SeLabeler, util, Uevent,
};

/// Callback invoked after a device node is created or removed, generalizing
/// the original implementation's `ctl.dev_added`/`ctl.dev_removed` Android
/// property-service notifications into a plain injectable hook.
///
/// Called with the `/dev` path and `true` for an add, `false` for a remove.
pub type DeviceNotifySink<'a> = &'a dyn Fn(&str, bool);

fn make_dir_all(path: &str) {
    if let Err(err) = fs::create_dir_all(path) {
        if err.kind() != std::io::ErrorKind::AlreadyExists {
            log::warn!("mkdir({path}) failed: {err}");
        }
    }
}

/// Applies every registered sysfs-attribute rule whose name matches the
/// event's devpath (with the leading `/sys` understood, not present).
pub fn fixup_sys_perms(rules: &RuleTable, labeler: &dyn SeLabeler, upath: &str) {
    for rule in rules.matching_sys_perms(upath) {
        let target = format!("/sys{upath}/{}", rule.attr);
        log::info!(
            "fixup {target} {} {} {:#o}",
            rule.uid,
            rule.gid,
            u32::from(rule.perm)
        );

        // SAFETY: `target` is process-owned and not shared with other
        // threads; chown/chmod take plain C strings constructed below.
        if let Ok(c) = std::ffi::CString::new(target.as_str()) {
            unsafe {
                libc::chown(c.as_ptr(), rule.uid, rule.gid);
                libc::chmod(c.as_ptr(), rule.perm.into());
            }
        }

        if let Some(context) = labeler.lookup(&target, rule.perm) {
            labeler.apply(&target, &context);
        }
    }
}

/// Common add/remove handling shared by every device class: creates or
/// removes the device node (if it carries a device number), then
/// creates/removes every symlink in `links`, then notifies `notify`.
fn handle_device(
    action: &str,
    devpath: &str,
    lookup_path: &str,
    block: bool,
    major: i32,
    minor: i32,
    links: &[String],
    rules: &RuleTable,
    labeler: &dyn SeLabeler,
    notify: Option<DeviceNotifySink<'_>>,
) {
    let has_devnum = major >= 0 && minor >= 0;

    if action == "add" {
        if has_devnum {
            if let Err(err) =
                device_node::make_device(devpath, lookup_path, block, major as u32, minor as u32, rules, labeler)
            {
                log::error!("{err}");
            }
        }
        if let Some(notify) = notify {
            notify(devpath, true);
        }
        for link in links {
            if let Err(err) = device_node::make_link(link, devpath) {
                log::error!("{err}");
            }
        }
    } else if action == "remove" {
        for link in links {
            if let Err(err) = device_node::remove_link(link, devpath) {
                log::error!("{err}");
            }
        }
        if let Some(notify) = notify {
            notify(devpath, false);
        }
        if has_devnum {
            if let Err(err) = device_node::remove_device(devpath) {
                log::error!("{err}");
            }
        }
    }
}

/// Tracks or untracks a platform-bus device on `add`/`remove`.
pub fn handle_platform_device_event(platform: &mut PlatformRegistry, event: &Uevent<'_>) {
    match event.action {
        "add" => platform.add(event.path),
        "remove" => platform.remove(event.path),
        _ => {}
    }
}

/// Extracts the last path component of the event's devpath, as the
/// `/dev` node's base name. Returns `None` for a path with no trailing
/// component past a given length, mirroring the original's fixed 64-byte
/// stack-buffer guard (kept here as a pure sanity check, not a buffer
/// limit).
fn parse_device_name<'a>(path: &'a str, max_len: usize) -> Option<&'a str> {
    let name = path.rsplit('/').next()?;
    if name.is_empty() || name.len() > max_len {
        None
    } else {
        Some(name)
    }
}

/// Builds the `/dev/block/platform/<device>/by-name/<part>`,
/// `by-num/p<N>`, and bare-partition symlinks for a platform or PCI block
/// device, matching the original's `parse_platform_block_device`.
fn parse_platform_block_device(platform: &PlatformRegistry, event: &Uevent<'_>) -> Vec<String> {
    let device = if let Some((_, name)) = platform.find(event.path) {
        Some(name.to_owned())
    } else if let Some(rest) = event.path.strip_prefix("/devices/pci") {
        // two path segments: PCI domain+bus, then peripheral ID
        let mut parts = rest.splitn(3, '/');
        let _first = parts.next();
        parts.next().map(|second| format!("pci{second}"))
    } else {
        None
    };

    let Some(device) = device else {
        return Vec::new();
    };

    log::info!("found platform device {device}");
    let link_path = format!("/dev/block/platform/{device}");
    let mut links = Vec::with_capacity(3);

    if !event.partition_name.is_empty() {
        match util::sanitize(event.partition_name) {
            Ok(sanitized) => {
                if sanitized != event.partition_name {
                    log::info!(
                        "linking partition '{}' as '{sanitized}'",
                        event.partition_name
                    );
                }
                links.push(format!("{link_path}/by-name/{sanitized}"));
            }
            Err(err) => log::error!("{err}"),
        }
    }

    if event.partition_num >= 0 {
        links.push(format!("{link_path}/by-num/p{}", event.partition_num));
    }

    if let Some(name) = event.path.rsplit('/').next() {
        links.push(format!("{link_path}/{name}"));
    }

    links
}

/// Builds the `/dev/usb/<subsystem><n>` symlink for a USB interface
/// hanging off a platform device, matching
/// `get_character_device_symlinks`.
fn character_device_symlinks(platform: &PlatformRegistry, event: &Uevent<'_>) -> Vec<String> {
    let Some((bus_path, _)) = platform.find(event.path) else {
        return Vec::new();
    };

    // `rest` starts at the '/' right after "/devices/platform/<driver>"
    let Some(rest) = event.path.get(bus_path.len()..) else {
        return Vec::new();
    };
    let Some(after_usb) = rest.strip_prefix("/usb") else {
        return Vec::new();
    };

    // segments are: root hub name remainder, device, interface
    let mut segs = after_usb.splitn(3, '/');
    let _root_hub = segs.next();
    let _device = segs.next();
    let Some(interface) = segs.next() else {
        return Vec::new();
    };

    make_dir_all("/dev/usb");
    vec![format!("/dev/usb/{}{interface}", event.subsystem)]
}

/// Handles a `block` subsystem uevent.
pub fn handle_block_device_event(
    platform: &PlatformRegistry,
    rules: &RuleTable,
    labeler: &dyn SeLabeler,
    notify: Option<DeviceNotifySink<'_>>,
    event: &Uevent<'_>,
) {
    let Some(name) = parse_device_name(event.path, 64) else {
        return;
    };

    let devpath = format!("/dev/block/{name}");
    make_dir_all("/dev/block");

    let links = if event.path.starts_with("/devices/") {
        parse_platform_block_device(platform, event)
    } else {
        Vec::new()
    };

    handle_device(
        event.action,
        &devpath,
        event.path,
        true,
        event.major,
        event.minor,
        &links,
        rules,
        labeler,
        notify,
    );
}

/// USB-device-class ownership, mode, and power-control fixup applied after
/// a USB generic-device event is handled.
pub fn handle_usb_device_class_rule(rules: &RuleTable, labeler: &dyn SeLabeler, event: &Uevent<'_>, devpath: &str) {
    if event.devtype.is_empty() {
        return;
    }

    let Some(class_rule) = rules.find_usb_class(event.devtype) else {
        return;
    };

    if let Ok(c) = std::ffi::CString::new(devpath) {
        // SAFETY: `c` is a valid NUL-terminated string for the call.
        unsafe {
            libc::chown(c.as_ptr(), class_rule.uid, class_rule.gid);
            libc::chmod(c.as_ptr(), class_rule.perm.into());
        }
    }

    if class_rule.pwr_ctrl_auto || class_rule.pwr_ctrl_on || class_rule.pwr_ctrl_perm {
        let sysfs = format!("/sys{}/power/control", event.path);

        if class_rule.pwr_ctrl_auto {
            let _ = fs::write(&sysfs, "auto");
        } else if class_rule.pwr_ctrl_on {
            let _ = fs::write(&sysfs, "on");
        }

        if class_rule.pwr_ctrl_perm {
            log::info!(
                "fixup {sysfs} {} {} {:#o}",
                class_rule.uid,
                class_rule.gid,
                u32::from(class_rule.perm)
            );
            if let Ok(c) = std::ffi::CString::new(sysfs.as_str()) {
                unsafe {
                    libc::chown(c.as_ptr(), class_rule.uid, class_rule.gid);
                    libc::chmod(c.as_ptr(), class_rule.perm.into());
                }
            }
        }
    }

    if let Some(context) = labeler.lookup(devpath, class_rule.perm) {
        labeler.apply(devpath, &context);
    }
}

/// Handles every non-`block`/`platform` subsystem uevent, applying the
/// original implementation's per-subsystem base-directory table and USB
/// special casing.
pub fn handle_generic_device_event(
    platform: &PlatformRegistry,
    rules: &RuleTable,
    labeler: &dyn SeLabeler,
    notify: Option<DeviceNotifySink<'_>>,
    event: &Uevent<'_>,
) {
    let Some(mut name) = parse_device_name(event.path, 64) else {
        return;
    };

    let mut devpath = String::new();
    let mut is_usb_dev = false;

    if event.subsystem.starts_with("usb") {
        if event.subsystem == "usb" {
            if !event.device_name.is_empty() {
                devpath = format!("/dev/{}", event.device_name);
                // build intermediate directories, skipping the leading "/dev/"
                let mut prefix = String::from("/dev");
                for segment in event.device_name.trim_end_matches('/').split('/') {
                    if segment.is_empty() {
                        continue;
                    }
                    prefix.push('/');
                    prefix.push_str(segment);
                    if prefix != devpath {
                        make_dir_all(&prefix);
                    }
                }
            } else {
                // minors are grouped by 128, starting at 001, imitating devfs
                let bus_id = event.minor / 128 + 1;
                let device_id = event.minor % 128 + 1;
                make_dir_all("/dev/bus");
                make_dir_all("/dev/bus/usb");
                make_dir_all(&format!("/dev/bus/usb/{bus_id:03}"));
                devpath = format!("/dev/bus/usb/{bus_id:03}/{device_id:03}");
            }
            is_usb_dev = true;
        } else {
            // ignore other USB subsystem events (usb_device, etc.)
            return;
        }
    }

    let base = if event.subsystem.starts_with("graphics") {
        "/dev/graphics/"
    } else if event.subsystem.starts_with("drm") {
        "/dev/dri/"
    } else if event.subsystem.starts_with("oncrpc") {
        "/dev/oncrpc/"
    } else if event.subsystem.starts_with("adsp") {
        "/dev/adsp/"
    } else if event.subsystem.starts_with("msm_camera") {
        "/dev/msm_camera/"
    } else if event.subsystem.starts_with("input") {
        "/dev/input/"
    } else if event.subsystem.starts_with("mtd") {
        "/dev/mtd/"
    } else if event.subsystem.starts_with("sound") {
        "/dev/snd/"
    } else if event.subsystem.starts_with("misc") && name.starts_with("log_") {
        name = &name[4..];
        "/dev/log/"
    } else {
        "/dev/"
    };

    if base != "/dev/" {
        make_dir_all(base);
    }

    let links = character_device_symlinks(platform, event);

    if devpath.is_empty() {
        devpath = format!("{base}{name}");
    }

    handle_device(
        event.action,
        &devpath,
        event.path,
        false,
        event.major,
        event.minor,
        &links,
        rules,
        labeler,
        notify,
    );

    if is_usb_dev {
        handle_usb_device_class_rule(rules, labeler, event, &devpath);
    }
}
