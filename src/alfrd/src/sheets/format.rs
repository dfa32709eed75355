//! Conditional-format rules in the JSON shape of the Sheets v4 API.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::a1::parse_range;
use super::error::SheetResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Color {
    #[serde(default)]
    pub red: f32,
    #[serde(default)]
    pub green: f32,
    #[serde(default)]
    pub blue: f32,
}

impl Color {
    pub const fn rgb(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_entered_value: Option<String>,
    /// Set instead of a value by `DATE_*` conditions, e.g. `PAST_WEEK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanCondition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ConditionValue>,
}

impl BooleanCondition {
    pub fn new(kind: &str, values: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            values: values
                .iter()
                .map(|v| ConditionValue {
                    user_entered_value: Some(v.to_string()),
                    relative_date: None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanRule {
    pub condition: BooleanCondition,
    #[serde(default)]
    pub format: CellFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    #[serde(default)]
    pub sheet_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<u32>,
}

impl GridRange {
    pub fn from_a1_range(range: &str, sheet_id: i64) -> SheetResult<Self> {
        let bounds = parse_range(range)?;
        Ok(Self {
            sheet_id,
            start_row_index: bounds.start_row,
            end_row_index: bounds.end_row,
            start_column_index: bounds.start_col,
            end_column_index: bounds.end_col,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalFormatRule {
    pub ranges: Vec<GridRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_rule: Option<BooleanRule>,
    /// Gradient rules are carried through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_rule: Option<serde_json::Value>,
}

impl ConditionalFormatRule {
    pub fn boolean(ranges: Vec<GridRange>, condition: BooleanCondition, background: Color) -> Self {
        Self {
            ranges,
            boolean_rule: Some(BooleanRule {
                condition,
                format: CellFormat {
                    background_color: Some(background),
                },
            }),
            gradient_rule: None,
        }
    }
}

/// Named background colours used by the row logger.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette(Vec<(&'static str, Color)>);

impl Default for Palette {
    fn default() -> Self {
        Self(vec![
            ("g", Color::rgb(0.56, 0.77, 0.49)),
            ("r", Color::rgb(0.878_431_4, 0.4, 0.4)),
            ("rh", Color::rgb(0.71, 0.13, 0.0)),
            ("rl", Color::rgb(0.98, 0.63, 0.57)),
            ("gl", Color::rgb(0.42, 0.86, 0.31)),
            ("gh", Color::rgb(0.42, 0.60, 0.42)),
        ])
    }
}

impl Palette {
    pub fn get(&self, key: &str) -> Option<Color> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, c)| *c)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.0.iter().map(|(k, _)| *k).collect()
    }
}

/// Ready-made rule shapes for pipeline status columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTemplate {
    /// Durations such as `3m 12s`.
    TimeInMin,
    True,
    False,
    Fail,
}

impl RuleTemplate {
    pub fn condition(&self, range: &str) -> BooleanCondition {
        match self {
            RuleTemplate::TimeInMin => BooleanCondition::new(
                "CUSTOM_FORMULA",
                &[&format!(
                    "=AND(ISNUMBER(SEARCH(\"m\", {range})), ISNUMBER(SEARCH(\"s\", {range})))"
                )],
            ),
            RuleTemplate::True => BooleanCondition::new("TEXT_CONTAINS", &["True"]),
            RuleTemplate::False => BooleanCondition::new("TEXT_CONTAINS", &["False"]),
            RuleTemplate::Fail => BooleanCondition::new("TEXT_CONTAINS", &["fail"]),
        }
    }
}

impl fmt::Display for RuleTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleTemplate::TimeInMin => "timeinmin",
            RuleTemplate::True => "True",
            RuleTemplate::False => "False",
            RuleTemplate::Fail => "fail",
        };
        f.write_str(name)
    }
}

impl FromStr for RuleTemplate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeinmin" => Ok(RuleTemplate::TimeInMin),
            "True" => Ok(RuleTemplate::True),
            "False" => Ok(RuleTemplate::False),
            "fail" => Ok(RuleTemplate::Fail),
            other => anyhow::bail!("unknown rule template '{other}'"),
        }
    }
}
