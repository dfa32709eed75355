//! Google Sheets access: service-account auth, worksheet contents as a
//! [`DataFrame`], cell-level updates and conditional-format rules.
pub mod a1;
pub mod auth;
mod client;
mod error;
pub mod format;
mod frame;
mod store;

pub use a1::{a1_to_rowcol, rowcol_to_a1};
pub use auth::{AccessToken, Auth, ServiceAccountKey};
pub use client::{GoogleSheet, SheetProperties, SheetSpec};
pub use error::{SheetError, SheetResult};
pub use format::{
    BooleanCondition, BooleanRule, CellFormat, Color, ConditionalFormatRule, GridRange, Palette,
    RuleTemplate,
};
pub use frame::{CellRef, CellRow, DataFrame};
pub use store::{LocalSheet, SheetStore};
