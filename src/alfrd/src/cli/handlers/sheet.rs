use crate::config::Config;
use crate::sheets::{GoogleSheet, SheetSpec};
use alfrd_common::{info_message, Colorize};
use anyhow::{bail, Result};
use std::path::PathBuf;

pub async fn sheet_show(
    config: &Config,
    url: Option<String>,
    sid: Option<String>,
    worksheet: Option<String>,
    wid: usize,
    key: Option<PathBuf>,
    rows: usize,
) -> Result<()> {
    if url.is_none() && sid.is_none() {
        bail!("either --url or --sid is needed");
    }
    let spec = SheetSpec::builder()
        .sid(sid.unwrap_or_default())
        .url(url.unwrap_or_default())
        .key(key.unwrap_or_else(|| config.credentials_file.clone()))
        .wid(wid)
        .wname(worksheet.unwrap_or_default())
        .build();

    let mut sheet = GoogleSheet::new(spec, config)?;
    let df = sheet.open().await?;
    info_message!("{} rows x {} columns", df.height(), df.width());
    println!("{}", df.head(rows));
    Ok(())
}
