use anyhow::{bail, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([^=!]+?)\s*(==|!=)\s*(?:"([^"]*)"|'([^']*)'|(.*?))\s*$"#)
        .expect("filter regex is valid")
});

/// Extra row condition, `column == "value"` or `column != "value"`.
/// Cells are compared after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
    pub negate: bool,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            negate: false,
        }
    }

    pub fn ne(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            negate: true,
            ..Self::eq(column, value)
        }
    }

    /// A missing cell reads as empty.
    pub fn matches(&self, cell: Option<&str>) -> bool {
        (cell.unwrap_or("").trim() == self.value) != self.negate
    }
}

impl FromStr for Filter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some(caps) = FILTER.captures(s) else {
            bail!("invalid filter '{s}', expected column==\"value\" or column!=\"value\"");
        };
        let column = caps[1].to_string();
        let value = (3..=5)
            .find_map(|i| caps.get(i))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        Ok(Self {
            column,
            value,
            negate: &caps[2] == "!=",
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.negate { "!=" } else { "==" };
        write!(f, "{}{}\"{}\"", self.column, op, self.value)
    }
}
