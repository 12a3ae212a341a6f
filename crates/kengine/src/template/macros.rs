//! `${name}$` macro substitution

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opening delimiter of a macro token
pub const MACRO_OPEN: &str = "${";

/// Closing delimiter of a macro token
pub const MACRO_CLOSE: &str = "}$";

/// Lookup table of macro values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroTable(BTreeMap<String, String>);

impl MacroTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy of this table with `overrides` applied on top
    pub fn layered(&self, overrides: &MacroTable) -> MacroTable {
        let mut merged = self.0.clone();
        merged.extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        MacroTable(merged)
    }

    /// Substitute macros in a single line
    pub fn apply(&self, line: &str) -> String {
        replace_macros(line, self)
    }
}

impl From<BTreeMap<String, String>> for MacroTable {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MacroTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Replace `${name}$` tokens in `line` with values from `table`
///
/// Tokens are resolved right to left, so an inner token is substituted
/// before the outer token's name is looked up. Unknown tokens and unclosed
/// `${` are left as they are.
pub fn replace_macros(line: &str, table: &MacroTable) -> String {
    if !line.contains(MACRO_OPEN) {
        return line.to_string();
    }

    let mut parts: Vec<String> = line.split(MACRO_OPEN).map(str::to_string).collect();

    while parts.len() > 1 {
        let (Some(ending), Some(mut head)) = (parts.pop(), parts.pop()) else {
            break;
        };

        match ending.split_once(MACRO_CLOSE) {
            None => {
                head.push_str(MACRO_OPEN);
                head.push_str(&ending);
            }
            Some((name, rest)) => {
                match table.get(name) {
                    Some(value) => head.push_str(value),
                    None => {
                        head.push_str(MACRO_OPEN);
                        head.push_str(name);
                        head.push_str(MACRO_CLOSE);
                    }
                }
                head.push_str(rest);
            }
        }

        parts.push(head);
    }

    parts.pop().unwrap_or_default()
}
