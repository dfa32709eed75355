use anyhow::{Context, Result};

use super::LogFrame;
use crate::livelog;
use crate::sheets::{BooleanCondition, Color, ConditionalFormatRule, GridRange, RuleTemplate, SheetStore};

impl<S: SheetStore> LogFrame<S> {
    fn background(&self, color_key: &str, custom_color: Option<Color>) -> Result<Color> {
        match custom_color {
            Some(color) => Ok(color),
            None => self.palette().get(color_key).with_context(|| {
                format!(
                    "unknown color '{color_key}', expected one of {:?}",
                    self.palette().keys()
                )
            }),
        }
    }

    /// Rule from one of the status templates, coloured with a palette key
    /// (`g r rh rl gl gh`) unless `custom_color` is given.
    pub fn create_conditional_format(
        &self,
        range: &str,
        color_key: &str,
        template: RuleTemplate,
        custom_color: Option<Color>,
    ) -> Result<ConditionalFormatRule> {
        self.create_condition(range, template.condition(range), color_key, custom_color)
    }

    /// Rule with an arbitrary condition type, e.g. `TEXT_EQ` or `NUMBER_GREATER`.
    pub fn create_rule(
        &self,
        range: &str,
        kind: &str,
        value: &str,
        color_key: &str,
        custom_color: Option<Color>,
    ) -> Result<ConditionalFormatRule> {
        self.create_condition(range, BooleanCondition::new(kind, &[value]), color_key, custom_color)
    }

    fn create_condition(
        &self,
        range: &str,
        condition: BooleanCondition,
        color_key: &str,
        custom_color: Option<Color>,
    ) -> Result<ConditionalFormatRule> {
        let grid = GridRange::from_a1_range(range, self.sheet_id())?;
        let color = self.background(color_key, custom_color)?;
        Ok(ConditionalFormatRule::boolean(vec![grid], condition, color))
    }

    pub fn create_color(r: f32, g: f32, b: f32) -> Color {
        Color::rgb(r, g, b)
    }

    /// Appends `rules` after the rules already on the worksheet.
    pub async fn add_conditional_format(&mut self, rules: Vec<ConditionalFormatRule>) -> Result<()> {
        let added = rules.len();
        self.store_mut().add_conditional_format_rules(rules).await?;
        livelog!("added {added} conditional format rules");
        Ok(())
    }

    pub async fn clear_conditional_format(&mut self) -> Result<()> {
        self.store_mut().clear_conditional_format_rules().await?;
        livelog!("cleared conditional format rules");
        Ok(())
    }
}
