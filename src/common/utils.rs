//! Utility functions for groupsaga

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Percent-encoding set for group ids placed in a URL path segment
const GROUP_ID_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&');

/// Encode a group id for use in `/group/{id}`
pub fn encode_group_id(group_id: &str) -> String {
    utf8_percent_encode(group_id, GROUP_ID_ENCODE_SET).to_string()
}

/// Parse duration string (e.g., "100ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else {
        let split = s.len() - s.chars().last().map(char::len_utf8).unwrap_or(0);
        (&s[..split], &s[split..])
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => std::time::Duration::from_millis(num),
        "s" => std::time::Duration::from_secs(num),
        "m" => std::time::Duration::from_secs(num * 60),
        "h" => std::time::Duration::from_secs(num * 3600),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Validate a group id (non-empty, reasonable length, no control chars)
pub fn validate_group_id(group_id: &str) -> crate::Result<()> {
    if group_id.is_empty() {
        return Err(crate::Error::InvalidGroupId("group id cannot be empty".into()));
    }

    if group_id.len() > 1024 {
        return Err(crate::Error::InvalidGroupId(
            "group id too long (max 1024 bytes)".into(),
        ));
    }

    if group_id.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidGroupId(
            "group id contains invalid characters".into(),
        ));
    }

    Ok(())
}
