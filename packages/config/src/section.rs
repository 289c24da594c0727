//! The parsed section tree.

/// One `key value` line inside a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionLine {
    /// Lowercased key.
    pub key: String,
    /// Trimmed value with substitutions applied.
    pub value: String,
    pub line: usize,
}

/// A `<type [name]> ... </type>` block.
///
/// Type names and section names are lowercased by the parser. Options keep
/// source order; a key may repeat and the last occurrence wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub type_name: String,
    pub name: Option<String>,
    pub options: Vec<OptionLine>,
    pub children: Vec<Section>,
    /// Line of the opening tag.
    pub line: usize,
    /// Line of the closing tag, or of the tag itself when self-closing.
    pub end_line: usize,
}

impl Section {
    pub fn new(type_name: impl Into<String>, name: Option<String>, line: usize) -> Self {
        Self {
            type_name: type_name.into(),
            name,
            options: Vec::new(),
            children: Vec::new(),
            line,
            end_line: line,
        }
    }

    /// The effective value of `key`.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_wins() {
        let mut section = Section::new("zodb", None, 1);
        for (value, line) in [("10", 2), ("20", 3)] {
            section.options.push(OptionLine {
                key: "cache-size".to_string(),
                value: value.to_string(),
                line,
            });
        }
        assert_eq!(section.option("cache-size"), Some("20"));
        assert_eq!(section.option("pool-size"), None);
    }
}
