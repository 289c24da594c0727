//! Option schemas: which keys a section accepts and how their raw string
//! values are coerced into typed values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ConfigError, Result};
use crate::section::Section;

lazy_static! {
    static ref BYTE_SIZE: Regex = Regex::new(r"(?i)^(\d+)\s*(kb|mb|gb)?$").unwrap();
    static ref TIME_INTERVAL: Regex = Regex::new(r"(?i)^(\d+)\s*([smhd])?$").unwrap();
}

/// How a raw option value is turned into a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// `true`/`false`, `yes`/`no`, `on`/`off`, any case.
    Boolean,
    /// Decimal integer.
    Integer,
    /// Base-8 integer, with or without a `0o` prefix.
    Octal,
    /// Integer with an optional `KB`, `MB` or `GB` suffix.
    ByteSize,
    /// Integer with an optional `s`, `m`, `h` or `d` suffix, in seconds.
    TimeInterval,
    /// Filesystem path, not checked for existence.
    Path,
    String,
}

/// A coerced option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    Octal(u32),
    ByteSize(u64),
    Seconds(u64),
    Path(PathBuf),
    String(String),
}

/// The name an option goes by in error messages: `blob-dir-permissions`
/// becomes `blob_dir_permissions`.
fn attribute(key: &str) -> String {
    key.replace('-', "_")
}

impl Coercion {
    /// Coerce `raw`, naming `key` in the error on failure.
    pub fn coerce(self, key: &str, raw: &str) -> Result<OptionValue> {
        let expected = |what: &str| {
            ConfigError::value(format!(
                "Expected {} for {} option, got: '{}'",
                what,
                attribute(key),
                raw
            ))
        };

        match self {
            Coercion::Boolean => match raw.to_lowercase().as_str() {
                "true" | "yes" | "on" => Ok(OptionValue::Boolean(true)),
                "false" | "no" | "off" => Ok(OptionValue::Boolean(false)),
                _ => Err(expected("a boolean")),
            },
            Coercion::Integer => raw
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|_| expected("an integer")),
            Coercion::Octal => {
                let digits = raw
                    .strip_prefix("0o")
                    .or_else(|| raw.strip_prefix("0O"))
                    .unwrap_or(raw);
                if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
                    return Err(expected("an octal"));
                }
                u32::from_str_radix(digits, 8)
                    .map(OptionValue::Octal)
                    .map_err(|_| expected("an octal"))
            }
            Coercion::ByteSize => {
                let caps = BYTE_SIZE.captures(raw).ok_or_else(|| expected("a byte size"))?;
                let multiplier: u64 = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
                    None => 1,
                    Some(suffix) if suffix == "kb" => 1 << 10,
                    Some(suffix) if suffix == "mb" => 1 << 20,
                    Some(_) => 1 << 30,
                };
                caps[1]
                    .parse::<u64>()
                    .ok()
                    .and_then(|n| n.checked_mul(multiplier))
                    .map(OptionValue::ByteSize)
                    .ok_or_else(|| expected("a byte size"))
            }
            Coercion::TimeInterval => {
                let caps = TIME_INTERVAL
                    .captures(raw)
                    .ok_or_else(|| expected("a time interval"))?;
                let multiplier: u64 = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
                    None => 1,
                    Some(unit) if unit == "s" => 1,
                    Some(unit) if unit == "m" => 60,
                    Some(unit) if unit == "h" => 60 * 60,
                    Some(_) => 24 * 60 * 60,
                };
                caps[1]
                    .parse::<u64>()
                    .ok()
                    .and_then(|n| n.checked_mul(multiplier))
                    .map(OptionValue::Seconds)
                    .ok_or_else(|| expected("a time interval"))
            }
            Coercion::Path => Ok(OptionValue::Path(PathBuf::from(raw))),
            Coercion::String => Ok(OptionValue::String(raw.to_string())),
        }
    }
}

/// One declared option.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub key: String,
    pub coercion: Coercion,
    /// Raw default, coerced like a configured value.
    pub default: Option<String>,
    pub required: bool,
}

/// The options a section type accepts.
///
/// ```rust
/// use dbtopo_config::{Coercion, OptionSchema};
///
/// let schema = OptionSchema::strict()
///     .required("path", Coercion::Path)
///     .with_default("read-only", Coercion::Boolean, "false")
///     .optional("quota", Coercion::ByteSize);
/// assert!(schema.is_strict());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    options: Vec<OptionSpec>,
    strict: bool,
}

impl OptionSchema {
    /// A schema rejecting unknown keys.
    pub fn strict() -> Self {
        Self {
            options: Vec::new(),
            strict: true,
        }
    }

    /// A schema ignoring unknown keys.
    pub fn lenient() -> Self {
        Self::default()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn required(self, key: &str, coercion: Coercion) -> Self {
        self.declare(key, coercion, None, true)
    }

    pub fn optional(self, key: &str, coercion: Coercion) -> Self {
        self.declare(key, coercion, None, false)
    }

    pub fn with_default(self, key: &str, coercion: Coercion, default: &str) -> Self {
        self.declare(key, coercion, Some(default.to_string()), false)
    }

    fn declare(
        mut self,
        key: &str,
        coercion: Coercion,
        default: Option<String>,
        required: bool,
    ) -> Self {
        self.options.retain(|spec| spec.key != key);
        self.options.push(OptionSpec {
            key: key.to_string(),
            coercion,
            default,
            required,
        });
        self
    }

    pub fn spec(&self, key: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|spec| spec.key == key)
    }

    pub fn specs(&self) -> &[OptionSpec] {
        &self.options
    }

    /// Coerce the options of `section`.
    ///
    /// Option lines are checked in source order, so the first bad line is the
    /// one reported. Repeated keys resolve to their last value. Unknown keys
    /// fail in strict mode and are skipped otherwise. Defaults and required
    /// options are settled after every line has been checked.
    pub fn coerce(&self, section: &Section) -> Result<Options> {
        let mut values = BTreeMap::new();
        for (index, option) in section.options.iter().enumerate() {
            let Some(spec) = self.spec(&option.key) else {
                if self.strict {
                    return Err(ConfigError::value(format!(
                        "'{}' is not a known key name for <{}> (line {})",
                        option.key, section.type_name, option.line
                    )));
                }
                log::debug!(
                    "Ignoring unknown option '{}' in <{}> (line {})",
                    option.key,
                    section.type_name,
                    option.line
                );
                continue;
            };
            let overridden = section.options[index + 1..]
                .iter()
                .any(|later| later.key == option.key);
            if overridden {
                continue;
            }
            let value = spec.coercion.coerce(&spec.key, &option.value)?;
            values.insert(spec.key.clone(), value);
        }

        for spec in &self.options {
            if values.contains_key(&spec.key) {
                continue;
            }
            match &spec.default {
                Some(default) => {
                    let value = spec.coercion.coerce(&spec.key, default)?;
                    values.insert(spec.key.clone(), value);
                }
                None if spec.required => {
                    return Err(ConfigError::value(format!(
                        "No value provided for required option '{}' in <{}> (line {})",
                        spec.key, section.type_name, section.line
                    )))
                }
                None => {}
            }
        }
        Ok(Options { values })
    }
}

/// Typed option values of one section, after coercion and defaults.
///
/// Typed getters return `None` both for absent options and for options of a
/// different type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    values: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            OptionValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            OptionValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn octal(&self, key: &str) -> Option<u32> {
        match self.get(key)? {
            OptionValue::Octal(n) => Some(*n),
            _ => None,
        }
    }

    pub fn byte_size(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            OptionValue::ByteSize(n) => Some(*n),
            _ => None,
        }
    }

    pub fn seconds(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            OptionValue::Seconds(n) => Some(*n),
            _ => None,
        }
    }

    pub fn path(&self, key: &str) -> Option<&Path> {
        match self.get(key)? {
            OptionValue::Path(p) => Some(p.as_path()),
            _ => None,
        }
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            OptionValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// A required path; missing only if the schema did not mark it required.
    pub fn require_path(&self, key: &str) -> Result<PathBuf> {
        self.path(key)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                ConfigError::value(format!("No value provided for required option '{}'", key))
            })
    }

    /// An integer option that must fit a `usize`.
    pub fn count(&self, key: &str) -> Result<Option<usize>> {
        self.integer(key)
            .map(|n| {
                usize::try_from(n).map_err(|_| {
                    ConfigError::value(format!(
                        "Expected a non-negative integer for {} option, got: '{}'",
                        attribute(key),
                        n
                    ))
                })
            })
            .transpose()
    }
}
