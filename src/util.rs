//! Small string/glob helpers shared by the rule tables and device-node
//! materializer.

use crate::{Error, Result};

/// Gets whether the provided character is whitelisted for a device node or
/// partition-name symlink component.
pub fn whitelisted_char_for_devnode(c: char, white: &str) -> bool {
    c.is_ascii_digit()
        || c.is_ascii_uppercase()
        || c.is_ascii_lowercase()
        || "#+-.:=@_".contains(c)
        || white.contains(c)
}

/// Sanitizes a partition name (or other untrusted sysfs-derived string)
/// before it is used as a symlink path component, escaping anything not on
/// the whitelist as `\xHH`.
pub fn sanitize(arg: &str) -> Result<String> {
    if arg.is_empty() {
        Err(Error::Uevent("empty sanitize input".into()))
    } else {
        let arg_len = arg.len();
        let mut ret = String::with_capacity(arg_len.saturating_mul(4));
        let null_pos = arg.find('\0').unwrap_or(arg_len);

        for c in arg[..null_pos].chars() {
            let seqlen = c.len_utf8();
            if seqlen > 1 {
                let mut bytes = [0u8; 4];
                ret.push_str(c.encode_utf8(&mut bytes));
            } else if c == '\\' || !whitelisted_char_for_devnode(c, "") {
                ret = format!("{ret}\\x{:02x}", c as u8);
            } else {
                ret.push(c);
            }
        }

        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelisted_char_for_devnode() {
        for c in '0'..='9' {
            assert!(whitelisted_char_for_devnode(c, ""));
        }
        for c in 'a'..='z' {
            assert!(whitelisted_char_for_devnode(c, ""));
        }
        for c in "#+-.:=@_".chars() {
            assert!(whitelisted_char_for_devnode(c, ""));
        }
        for c in "`~%^&*(){}!$|\\".chars() {
            assert!(!whitelisted_char_for_devnode(c, ""));
        }
    }

    #[test]
    fn test_sanitize() {
        assert!(sanitize("").is_err());
        assert_eq!(sanitize("system").unwrap(), "system");
        assert_eq!(sanitize("bad name").unwrap(), "bad\\x20name");
    }
}
