//! A string table mirroring one worksheet: a header row plus data rows.
//! Cells are never numericised; everything the sheet returns stays text.
use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;

use super::a1::rowcol_to_a1;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataFrame {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Row part of a cell address inside a [`DataFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CellRow {
    Header,
    Data(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: CellRow,
    pub col: usize,
}

impl CellRef {
    pub fn data(row: usize, col: usize) -> Self {
        Self {
            row: CellRow::Data(row),
            col,
        }
    }

    pub fn header(col: usize) -> Self {
        Self {
            row: CellRow::Header,
            col,
        }
    }

    /// Position on the worksheet: the header is row 1, data row `i` is row `i + 2`.
    pub fn a1(&self) -> String {
        let row = match self.row {
            CellRow::Header => 1,
            CellRow::Data(i) => i as u32 + 2,
        };
        rowcol_to_a1(row, self.col as u32 + 1)
    }
}

impl DataFrame {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a frame from a header and raw rows; short rows are padded with
    /// empty cells and long rows are cut to the header width.
    pub fn from_records(columns: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = records
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Values of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = value.into();
                true
            }
            None => false,
        }
    }

    /// Returns the index of `name`, appending an empty column when missing.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    pub fn push_row<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = values.into_iter().map(Into::into).collect();
        row.resize(self.width(), String::new());
        self.rows.push(row);
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> DataFrame {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Header followed by every row, the shape the values endpoint expects.
    pub fn to_values(&self) -> Vec<Vec<String>> {
        std::iter::once(self.columns.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }

    /// Cells of `self` that differ from `baseline`. Columns are matched by name,
    /// or by position when the name is not unique (e.g. blank headers), and rows
    /// by position; anything missing from the baseline counts as empty, and the
    /// header cell of a column the baseline lacks is reported too.
    pub fn diff(&self, baseline: &DataFrame) -> Vec<CellRef> {
        let mut changed = Vec::new();
        for (col, name) in self.columns.iter().enumerate() {
            let base_col = if self.is_repeated(name) || baseline.is_repeated(name) {
                (baseline.columns.get(col) == Some(name)).then_some(col)
            } else {
                baseline.column_index(name)
            };
            if base_col != Some(col) {
                changed.push(CellRef::header(col));
            }
            for (row, values) in self.rows.iter().enumerate() {
                let before = base_col
                    .and_then(|bc| baseline.cell(row, bc))
                    .unwrap_or("");
                if values[col] != before {
                    changed.push(CellRef::data(row, col));
                }
            }
        }
        changed.sort();
        changed
    }

    fn is_repeated(&self, name: &str) -> bool {
        self.columns.iter().filter(|c| *c == name).nth(1).is_some()
    }

    /// Writes the frame as CSV with a leading row-index column.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        let header = std::iter::once(String::new()).chain(self.columns.iter().map(|c| csv_field(c)));
        out.push_str(&header.collect::<Vec<_>>().join(","));
        out.push('\n');
        for (idx, row) in self.rows.iter().enumerate() {
            let fields = std::iter::once(idx.to_string()).chain(row.iter().map(|c| csv_field(c)));
            out.push_str(&fields.collect::<Vec<_>>().join(","));
            out.push('\n');
        }
        fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(j, name)| {
                self.rows
                    .iter()
                    .map(|row| row[j].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let index_width = self.rows.len().to_string().len();

        write!(f, "{:index_width$}", "")?;
        for (name, width) in self.columns.iter().zip(widths.iter().copied()) {
            write!(f, "  {name:<width$}")?;
        }
        for (idx, row) in self.rows.iter().enumerate() {
            writeln!(f)?;
            write!(f, "{idx:<index_width$}")?;
            for (value, width) in row.iter().zip(widths.iter().copied()) {
                write!(f, "  {value:<width$}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample() -> DataFrame {
        DataFrame::from_records(
            strings(&["FILE_NAME", "stage1", "stage2"]),
            vec![strings(&["a.fits", "done"]), strings(&["b.fits", "", "", "extra"])],
        )
    }

    #[test]
    fn test_from_records_pads_rows() {
        let df = sample();
        assert_eq!(df.width(), 3);
        assert_eq!(df.rows()[0], strings(&["a.fits", "done", ""]));
        assert_eq!(df.rows()[1], strings(&["b.fits", "", ""]));
    }

    #[test]
    fn test_diff_reports_changed_and_new_cells() {
        let baseline = sample();
        let mut df = baseline.clone();
        assert!(df.diff(&baseline).is_empty());

        df.set(1, 2, "12m 3s");
        let comment = df.ensure_column("Comment4");
        df.set(0, comment, "failed:timeout");

        assert_eq!(
            df.diff(&baseline),
            vec![CellRef::header(3), CellRef::data(0, 3), CellRef::data(1, 2)]
        );
    }

    #[test]
    fn test_diff_with_repeated_headers() {
        let baseline = DataFrame::from_records(
            strings(&["FILE_NAME", "", "", "stage1"]),
            vec![strings(&["a.fits", "x", "y", ""])],
        );
        let mut df = baseline.clone();
        assert!(df.diff(&baseline).is_empty());

        df.set(0, 2, "z");
        df.set(0, 3, "done");
        assert_eq!(df.diff(&baseline), vec![CellRef::data(0, 2), CellRef::data(0, 3)]);
    }

    #[test]
    fn test_cell_ref_a1() {
        assert_eq!(CellRef::header(0).a1(), "A1");
        assert_eq!(CellRef::data(0, 1).a1(), "B2");
        assert_eq!(CellRef::data(9, 27).a1(), "AB11");
    }

    #[test]
    fn test_write_csv() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("df_sheet.csv");
        let mut df = sample();
        df.set(0, 1, "done, \"twice\"");
        df.write_csv(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            ",FILE_NAME,stage1,stage2\n0,a.fits,\"done, \"\"twice\"\"\",\n1,b.fits,,\n"
        );
    }

    #[test]
    fn test_to_values_starts_with_header() {
        let values = sample().to_values();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], strings(&["FILE_NAME", "stage1", "stage2"]));
    }
}
