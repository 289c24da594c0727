//! Line-oriented parser for the section grammar.
//!
//! ```text
//! # comment
//! %define dir /var/data
//! <zodb main>
//!   cache-size 1000
//!   <filestorage>
//!     path $dir/Data.fs
//!   </filestorage>
//! </zodb>
//! <zodb scratch>
//!   <mappingstorage/>
//! </zodb>
//! ```
//!
//! Each non-blank line is a comment, a `%define` directive, an open tag
//! (`<type>`, `<type name>`, optionally self-closing with `/>`), a close tag
//! (`</type>`), or a `key value` option line. Type names, section names and
//! keys are case-insensitive.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ConfigError, Result};
use crate::section::{OptionLine, Section};

lazy_static! {
    static ref OPEN_TAG: Regex =
        Regex::new(r"^<\s*([A-Za-z_][\w.-]*)(?:\s+([^\s/>]+))?\s*(/)?>$").unwrap();
    static ref CLOSE_TAG: Regex = Regex::new(r"^</\s*([A-Za-z_][\w.-]*)\s*>$").unwrap();
    static ref OPTION_KEY: Regex = Regex::new(r"^[A-Za-z_][\w.-]*$").unwrap();
    static ref DEFINE: Regex = Regex::new(r"(?i)^%define\s+([A-Za-z_]\w*)(?:\s+(.*))?$").unwrap();
}

/// Parse configuration text into its top-level sections.
///
/// Fails on the first malformed construct with a syntax error carrying its
/// 1-based line number. Duplicate section names among siblings are reported
/// on the line where the duplicate section ends.
pub fn parse(text: &str) -> Result<Vec<Section>> {
    let mut parser = Parser::default();
    for (index, line) in text.lines().enumerate() {
        parser.line(index + 1, line)?;
    }
    parser.finish()
}

#[derive(Default)]
struct Parser {
    defines: BTreeMap<String, String>,
    open: Vec<Section>,
    roots: Vec<Section>,
}

impl Parser {
    fn line(&mut self, line: usize, raw: &str) -> Result<()> {
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            Ok(())
        } else if text.starts_with('%') {
            self.directive(line, text)
        } else if text.starts_with("</") {
            self.close(line, text)
        } else if text.starts_with('<') {
            self.open(line, text)
        } else {
            self.option(line, text)
        }
    }

    fn open(&mut self, line: usize, text: &str) -> Result<()> {
        let caps = OPEN_TAG.captures(text).ok_or_else(|| {
            ConfigError::syntax(format!("malformed section start: {}", text), line)
        })?;
        let type_name = caps[1].to_lowercase();
        let name = caps.get(2).map(|m| m.as_str().to_lowercase());
        let section = Section::new(type_name, name, line);

        if caps.get(3).is_some() {
            self.attach(section, line)
        } else {
            self.open.push(section);
            Ok(())
        }
    }

    fn close(&mut self, line: usize, text: &str) -> Result<()> {
        let caps = CLOSE_TAG
            .captures(text)
            .ok_or_else(|| ConfigError::syntax(format!("malformed section end: {}", text), line))?;
        let type_name = caps[1].to_lowercase();

        let mut section = self.open.pop().ok_or_else(|| {
            ConfigError::syntax(format!("unexpected section end: </{}>", type_name), line)
        })?;
        if section.type_name != type_name {
            return Err(ConfigError::syntax(
                format!(
                    "</{}> does not close <{}> opened on line {}",
                    type_name, section.type_name, section.line
                ),
                line,
            ));
        }
        section.end_line = line;
        self.attach(section, line)
    }

    /// Add a finished section to the innermost open section, or to the roots.
    fn attach(&mut self, section: Section, line: usize) -> Result<()> {
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        };
        if let Some(name) = &section.name {
            if siblings.iter().any(|s| s.name.as_ref() == Some(name)) {
                return Err(ConfigError::syntax(
                    format!(
                        "section names must not be re-used within the same container:'{}'",
                        name
                    ),
                    line,
                ));
            }
        }
        siblings.push(section);
        Ok(())
    }

    fn option(&mut self, line: usize, text: &str) -> Result<()> {
        let (key, value) = match text.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (text, ""),
        };
        if !OPTION_KEY.is_match(key) {
            return Err(ConfigError::syntax(
                format!("malformed option line: {}", text),
                line,
            ));
        }
        if value.is_empty() {
            return Err(ConfigError::syntax(
                format!("missing value for option '{}'", key),
                line,
            ));
        }
        let value = self.substitute(value, line)?;
        let section = self.open.last_mut().ok_or_else(|| {
            ConfigError::syntax(format!("option '{}' outside of any section", key), line)
        })?;
        section.options.push(OptionLine {
            key: key.to_lowercase(),
            value,
            line,
        });
        Ok(())
    }

    fn directive(&mut self, line: usize, text: &str) -> Result<()> {
        let caps = DEFINE
            .captures(text)
            .ok_or_else(|| ConfigError::syntax(format!("unknown directive: {}", text), line))?;
        let name = caps[1].to_lowercase();
        let raw = caps.get(2).map_or("", |m| m.as_str().trim());
        let value = self.substitute(raw, line)?;
        if self.defines.contains_key(&name) {
            return Err(ConfigError::syntax(
                format!("cannot redefine '{}'", name),
                line,
            ));
        }
        self.defines.insert(name, value);
        Ok(())
    }

    /// Expand `$name`, `${name}` and `$$` in a value.
    fn substitute(&self, value: &str, line: usize) -> Result<String> {
        let mut out = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            let name = match chars.peek() {
                Some('$') => {
                    chars.next();
                    out.push('$');
                    continue;
                }
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => {
                                return Err(ConfigError::syntax(
                                    "unterminated ${...} substitution",
                                    line,
                                ))
                            }
                        }
                    }
                    name
                }
                Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if !(c.is_ascii_alphanumeric() || c == '_') {
                            break;
                        }
                        name.push(c);
                        chars.next();
                    }
                    name
                }
                _ => return Err(ConfigError::syntax("illegal lone '$' in value", line)),
            };
            match self.defines.get(&name.to_lowercase()) {
                Some(defined) => out.push_str(defined),
                None => {
                    return Err(ConfigError::syntax(
                        format!("undefined substitution name '{}'", name),
                        line,
                    ))
                }
            }
        }
        Ok(out)
    }

    fn finish(self) -> Result<Vec<Section>> {
        if let Some(section) = self.open.last() {
            return Err(ConfigError::syntax(
                format!("unclosed section <{}>", section.type_name),
                section.line,
            ));
        }
        Ok(self.roots)
    }
}
