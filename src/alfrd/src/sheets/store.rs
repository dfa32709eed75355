use super::error::{SheetError, SheetResult};
use super::format::ConditionalFormatRule;
use super::frame::{CellRef, CellRow, DataFrame};

/// Where a row logger reads its worksheet from and pushes its changes to.
#[allow(async_fn_in_trait)]
pub trait SheetStore {
    /// Contents as last fetched.
    fn frame(&self) -> &DataFrame;

    /// Numeric id of the worksheet, used by grid ranges.
    fn sheet_id(&self) -> i64;

    /// Replaces the worksheet with the header and rows of `frame`; returns the rows written.
    async fn update(&mut self, frame: &DataFrame) -> SheetResult<usize>;

    /// Writes the listed cells of `frame`; returns the cells written.
    async fn update_cells(&mut self, frame: &DataFrame, cells: &[CellRef]) -> SheetResult<usize>;

    async fn conditional_format_rules(&mut self) -> SheetResult<Vec<ConditionalFormatRule>>;

    /// Appends after the rules already on the worksheet.
    async fn add_conditional_format_rules(&mut self, rules: Vec<ConditionalFormatRule>) -> SheetResult<()>;

    async fn clear_conditional_format_rules(&mut self) -> SheetResult<()>;
}

/// In-memory worksheet, for running the row logger against a local frame.
#[derive(Debug, Default)]
pub struct LocalSheet {
    frame: DataFrame,
    rules: Vec<ConditionalFormatRule>,
    sheet_id: i64,
    pushes: usize,
    reject_status: Option<u16>,
}

impl LocalSheet {
    pub fn new(frame: DataFrame) -> Self {
        Self {
            frame,
            ..Default::default()
        }
    }

    /// Number of successful `update`/`update_cells` calls.
    pub fn pushes(&self) -> usize {
        self.pushes
    }

    pub fn rules(&self) -> &[ConditionalFormatRule] {
        &self.rules
    }

    /// Makes every later write fail with an API error of the given status.
    pub fn reject_writes(&mut self, status: Option<u16>) {
        self.reject_status = status;
    }

    fn check_writable(&self) -> SheetResult<()> {
        match self.reject_status {
            Some(status) => Err(SheetError::api_error(status, "writes rejected".to_string())),
            None => Ok(()),
        }
    }
}

impl SheetStore for LocalSheet {
    fn frame(&self) -> &DataFrame {
        &self.frame
    }

    fn sheet_id(&self) -> i64 {
        self.sheet_id
    }

    async fn update(&mut self, frame: &DataFrame) -> SheetResult<usize> {
        self.check_writable()?;
        self.frame = frame.clone();
        self.pushes += 1;
        Ok(frame.height() + 1)
    }

    async fn update_cells(&mut self, frame: &DataFrame, cells: &[CellRef]) -> SheetResult<usize> {
        self.check_writable()?;
        for cell in cells {
            let name = frame
                .columns()
                .get(cell.col)
                .ok_or_else(|| SheetError::InvalidRange(cell.a1()))?;
            let col = self.frame.ensure_column(name);
            if let CellRow::Data(row) = cell.row {
                while self.frame.height() <= row {
                    self.frame.push_row(Vec::<String>::new());
                }
                self.frame.set(row, col, frame.cell(row, cell.col).unwrap_or_default());
            }
        }
        self.pushes += 1;
        Ok(cells.len())
    }

    async fn conditional_format_rules(&mut self) -> SheetResult<Vec<ConditionalFormatRule>> {
        Ok(self.rules.clone())
    }

    async fn add_conditional_format_rules(&mut self, rules: Vec<ConditionalFormatRule>) -> SheetResult<()> {
        self.check_writable()?;
        self.rules.extend(rules);
        Ok(())
    }

    async fn clear_conditional_format_rules(&mut self) -> SheetResult<()> {
        self.check_writable()?;
        self.rules.clear();
        Ok(())
    }
}
