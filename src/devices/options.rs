//! Option tokenizer for comma-separated device specs.
//!
//! A device spec has the form `<device-type>[,<key>[=<value>]]*`. Options are
//! kept as an ordered sequence rather than a map: devices decode them one by
//! one, so a later key overwrites an earlier one.

use std::fmt;

use serde::Serialize;

use crate::error::{DeviceError, Result};

/// One `key=value` (or bare `key`) token from a device spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceOption {
    pub key: String,
    /// Empty when the token had no `=`.
    pub value: String,
}

impl DeviceOption {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A value-less option such as `nat` or `listen`.
    pub fn flag(key: impl Into<String>) -> Self {
        Self::new(key, "")
    }

    /// Split a single segment on its first `=` only.
    pub fn parse(segment: &str) -> Self {
        match segment.split_once('=') {
            Some((key, value)) => Self::new(key, value),
            None => Self::flag(segment),
        }
    }

    pub fn is_flag(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for DeviceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_flag() {
            f.write_str(&self.key)
        } else {
            write!(f, "{}={}", self.key, self.value)
        }
    }
}

/// Tokenize already-split segments, silently dropping empty ones.
pub fn options_from_segments<'a, I>(segments: I) -> Vec<DeviceOption>
where
    I: IntoIterator<Item = &'a str>,
{
    segments
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .map(DeviceOption::parse)
        .collect()
}

/// Tokenize a comma-separated option string.
pub fn parse_options(input: &str) -> Vec<DeviceOption> {
    options_from_segments(input.split(','))
}

/// Split a raw device spec into its device-type tag and its options.
///
/// Fails with [`DeviceError::EmptySpec`] when there is no tag in front of the
/// first comma.
pub fn split_device_spec(spec: &str) -> Result<(&str, Vec<DeviceOption>)> {
    let mut segments = spec.split(',');
    let tag = match segments.next() {
        Some(tag) if !tag.is_empty() => tag,
        _ => return Err(DeviceError::EmptySpec),
    };
    Ok((tag, options_from_segments(segments)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_equals_only() {
        let opt = DeviceOption::parse("cmdline=console=hvc0");
        assert_eq!(opt.key, "cmdline");
        assert_eq!(opt.value, "console=hvc0");
    }

    #[test]
    fn bare_key_has_empty_value() {
        let opt = DeviceOption::parse("nat");
        assert_eq!(opt, DeviceOption::flag("nat"));
        assert!(opt.is_flag());
        assert_eq!(opt.to_string(), "nat");
    }

    #[test]
    fn empty_segments_are_dropped() {
        let opts = parse_options(",path=/a,,readonly,");
        assert_eq!(
            opts,
            vec![DeviceOption::new("path", "/a"), DeviceOption::flag("readonly")]
        );
    }

    #[test]
    fn order_is_preserved() {
        let opts = parse_options("listen,connect,listen");
        let keys: Vec<_> = opts.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["listen", "connect", "listen"]);
    }

    #[test]
    fn trailing_commas_leave_no_options() {
        let (tag, opts) = split_device_spec("virtio-rng,,").unwrap();
        assert_eq!(tag, "virtio-rng");
        assert!(opts.is_empty());
    }

    #[test]
    fn empty_spec_is_rejected() {
        assert_eq!(split_device_spec(""), Err(DeviceError::EmptySpec));
        assert_eq!(split_device_spec(",path=/a"), Err(DeviceError::EmptySpec));
    }
}
