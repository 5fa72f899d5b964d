use crate::cell::{Cell, CellFormat, CellValue};
use crate::downloader;
use crate::error::GridError;
use crate::grid::{CsvExport, Grid, Range, SheetInfo, Workbook};
use serde::{Deserialize, Serialize};

/// Largest sheet a write may grow to. Columns stop at `ZZZ`.
pub const MAX_ROWS: usize = 1_000_000;
pub const MAX_COLUMNS: usize = 18278;
pub const MAX_CELLS: usize = 2_000_000;

/// An in-memory tab. Cells are stored row-major in a flat vector, the
/// allocated size grows on demand when something is written past the end.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct MemorySheet {
    pub name: String,
    pub id: u32,
    pub hidden: bool,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Cell>,
}

impl MemorySheet {
    pub fn spreadsheet_create(name: &str, id: u32, rows: usize, cols: usize) -> Self {
        MemorySheet {
            name: name.to_string(),
            id,
            hidden: false,
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
        }
    }

    /// Build a sheet from row data; short rows are padded with empty cells.
    pub fn from_values(name: &str, id: u32, values: Vec<Vec<CellValue>>) -> Self {
        let rows = values.len();
        let cols = values.iter().map(Vec::len).max().unwrap_or(0);
        let mut sheet = MemorySheet::spreadsheet_create(name, id, rows, cols);

        for (r, row) in values.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                let index = r * cols + c;
                sheet.cells[index] = Cell::create(value);
            }
        }

        sheet
    }

    fn index(&self, row: usize, col: usize) -> usize {
        (row - 1) * self.cols + (col - 1)
    }

    fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if row == 0 || col == 0 || row > self.rows || col > self.cols {
            return None;
        }
        self.cells.get(self.index(row, col))
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> Result<&mut Cell, GridError> {
        if row == 0 || col == 0 {
            return Err(GridError::InvalidRange {
                row,
                column: col,
                num_rows: 1,
                num_columns: 1,
            });
        }
        self.ensure_size(row, col)?;
        let index = self.index(row, col);
        Ok(&mut self.cells[index])
    }

    fn check_size(rows: usize, cols: usize) -> Result<(), GridError> {
        let cells = rows.checked_mul(cols).unwrap_or(usize::MAX);
        if rows > MAX_ROWS || cols > MAX_COLUMNS || cells > MAX_CELLS {
            return Err(GridError::TooLarge { rows, columns: cols });
        }
        Ok(())
    }

    /// Grow the allocated grid so that (rows, cols) is addressable.
    fn ensure_size(&mut self, rows: usize, cols: usize) -> Result<(), GridError> {
        Self::check_size(rows.max(self.rows), cols.max(self.cols))?;
        if cols > self.cols {
            let mut cells = Vec::with_capacity(self.rows * cols);
            for r in 0..self.rows {
                let start = r * self.cols;
                cells.extend_from_slice(&self.cells[start..start + self.cols]);
                cells.extend(std::iter::repeat_n(Cell::default(), cols - self.cols));
            }
            self.cells = cells;
            self.cols = cols;
        }
        if rows > self.rows {
            self.cells.resize((rows) * self.cols, Cell::default());
            self.rows = rows;
        }
        Ok(())
    }

    /// Insert an empty column so that it lands at 1-based position `at`.
    fn insert_column_at(&mut self, at: usize) {
        let cols = self.cols + 1;
        let mut cells = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            let start = r * self.cols;
            let row = &self.cells[start..start + self.cols];
            cells.extend_from_slice(&row[..at - 1]);
            cells.push(Cell::default());
            cells.extend_from_slice(&row[at - 1..]);
        }
        self.cells = cells;
        self.cols = cols;
    }

    pub fn set_format(&mut self, row: usize, col: usize, format: CellFormat) -> Result<(), GridError> {
        self.cell_mut(row, col)?.format = Some(Box::new(format));
        Ok(())
    }

    pub fn set_formula(
        &mut self,
        row: usize,
        col: usize,
        formula: &str,
        value: CellValue,
    ) -> Result<(), GridError> {
        let cell = self.cell_mut(row, col)?;
        cell.formula = Some(formula.to_string());
        cell.value = value;
        Ok(())
    }

    fn read<T>(&self, range: Range, read_cell: impl Fn(Option<&Cell>) -> T) -> Vec<Vec<T>> {
        (range.row..=range.end_row())
            .map(|r| {
                (range.column..=range.end_column())
                    .map(|c| read_cell(self.cell(r, c)))
                    .collect()
            })
            .collect()
    }
}

impl Grid for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn last_row(&self) -> usize {
        (1..=self.rows)
            .rev()
            .find(|&r| (1..=self.cols).any(|c| !self.cells[self.index(r, c)].is_blank()))
            .unwrap_or(0)
    }

    fn last_column(&self) -> usize {
        (1..=self.cols)
            .rev()
            .find(|&c| (1..=self.rows).any(|r| !self.cells[self.index(r, c)].is_blank()))
            .unwrap_or(0)
    }

    fn max_columns(&self) -> usize {
        self.cols
    }

    fn get_values(&self, range: Range) -> Result<Vec<Vec<CellValue>>, GridError> {
        range.validate()?;
        Ok(self.read(range, |cell| {
            cell.map(|c| c.value.clone()).unwrap_or_default()
        }))
    }

    fn get_formulas(&self, range: Range) -> Result<Vec<Vec<String>>, GridError> {
        range.validate()?;
        Ok(self.read(range, |cell| {
            cell.and_then(|c| c.formula.clone()).unwrap_or_default()
        }))
    }

    fn get_formats(&self, range: Range) -> Result<Vec<Vec<CellFormat>>, GridError> {
        range.validate()?;
        Ok(self.read(range, |cell| cell.map(Cell::format).unwrap_or_default()))
    }

    fn set_values(
        &mut self,
        row: usize,
        column: usize,
        values: &[Vec<CellValue>],
    ) -> Result<(), GridError> {
        let width = values.first().map(Vec::len).unwrap_or(0);
        let range = Range::new(row, column, values.len(), width);
        range.validate()?;

        if let Some((r, found)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != width)
            .map(|(r, v)| (r, v.len()))
        {
            return Err(GridError::RaggedData {
                row: row + r,
                expected: width,
                found,
            });
        }

        self.ensure_size(range.end_row(), range.end_column())?;
        for (r, row_values) in values.iter().enumerate() {
            for (c, value) in row_values.iter().enumerate() {
                let cell = self.cell_mut(row + r, column + c)?;
                let format = cell.format.take();
                *cell = Cell::create(value.clone());
                cell.format = format;
            }
        }

        Ok(())
    }

    fn fill(&mut self, range: Range, value: &CellValue) -> Result<(), GridError> {
        range.validate()?;
        let values = vec![vec![value.clone(); range.num_columns]; range.num_rows];
        self.set_values(range.row, range.column, &values)
    }

    fn clear_content(&mut self, range: Range) -> Result<(), GridError> {
        range.validate()?;
        let end_row = range.end_row().min(self.rows);
        let end_col = range.end_column().min(self.cols);
        for r in range.row..=end_row {
            for c in range.column..=end_col {
                let index = self.index(r, c);
                self.cells[index].clear_content();
            }
        }
        Ok(())
    }

    fn append_row(&mut self, values: Vec<CellValue>) -> Result<(), GridError> {
        if values.is_empty() {
            return Ok(());
        }
        let row = self.last_row() + 1;
        self.set_values(row, 1, &[values])
    }

    fn insert_column_before(&mut self, column: usize) -> Result<(), GridError> {
        if column < 1 || column > self.cols + 1 {
            return Err(GridError::ColumnOutOfBounds(column));
        }
        Self::check_size(self.rows, self.cols + 1)?;
        self.insert_column_at(column);
        Ok(())
    }

    fn insert_column_after(&mut self, column: usize) -> Result<(), GridError> {
        if column > self.cols {
            return Err(GridError::ColumnOutOfBounds(column));
        }
        Self::check_size(self.rows, self.cols + 1)?;
        self.insert_column_at(column + 1);
        Ok(())
    }

    fn delete_column(&mut self, column: usize) -> Result<(), GridError> {
        if column < 1 || column > self.cols {
            return Err(GridError::ColumnOutOfBounds(column));
        }
        let cols = self.cols - 1;
        let mut cells = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            let start = r * self.cols;
            let row = &self.cells[start..start + self.cols];
            cells.extend_from_slice(&row[..column - 1]);
            cells.extend_from_slice(&row[column..]);
        }
        self.cells = cells;
        self.cols = cols;
        Ok(())
    }
}

/// A spreadsheet held entirely in memory. Used by the server when no external
/// backend is configured, and by the tests.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct MemoryWorkbook {
    pub id: String,
    pub sheets: Vec<MemorySheet>,
    next_sheet_id: u32,
}

impl MemoryWorkbook {
    pub fn new(id: &str) -> Self {
        MemoryWorkbook {
            id: id.to_string(),
            sheets: Vec::new(),
            next_sheet_id: 0,
        }
    }

    /// Add an empty tab and return it.
    pub fn add_sheet(&mut self, name: &str) -> &mut MemorySheet {
        self.add_sheet_with_values(name, Vec::new())
    }

    pub fn add_sheet_with_values(&mut self, name: &str, values: Vec<Vec<CellValue>>) -> &mut MemorySheet {
        let id = self.next_sheet_id;
        self.next_sheet_id += 1;
        self.sheets.push(MemorySheet::from_values(name, id, values));
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&MemorySheet> {
        self.find_sheet(name).map(|position| &self.sheets[position])
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut MemorySheet> {
        self.find_sheet(name).map(move |position| &mut self.sheets[position])
    }
}

impl Workbook for MemoryWorkbook {
    fn spreadsheet_id(&self) -> &str {
        &self.id
    }

    fn sheets(&self) -> Vec<SheetInfo> {
        self.sheets
            .iter()
            .enumerate()
            .map(|(position, sheet)| SheetInfo {
                name: sheet.name.clone(),
                id: sheet.id,
                position,
                hidden: sheet.hidden,
            })
            .collect()
    }

    fn find_sheet(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.sheets
            .iter()
            .position(|sheet| sheet.name.to_lowercase() == name)
    }

    fn sheet(&self, position: usize) -> Option<&dyn Grid> {
        self.sheets.get(position).map(|sheet| sheet as &dyn Grid)
    }

    fn sheet_mut(&mut self, position: usize) -> Option<&mut dyn Grid> {
        self.sheets
            .get_mut(position)
            .map(|sheet| sheet as &mut dyn Grid)
    }

    fn export_csv(&self, sheet_id: u32) -> Result<CsvExport, GridError> {
        let sheet = self
            .sheets
            .iter()
            .find(|sheet| sheet.id == sheet_id)
            .ok_or(GridError::SheetNotFound(sheet_id))?;

        let (rows, cols) = (sheet.last_row(), sheet.last_column());
        let values = if rows == 0 || cols == 0 {
            Vec::new()
        } else {
            sheet.get_values(Range::new(1, 1, rows, cols))?
        };

        Ok(CsvExport {
            status: 200,
            body: downloader::grid_to_csv(&values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::text(s)
    }

    #[test]
    fn last_row_and_column_track_content() {
        let mut sheet = MemorySheet::spreadsheet_create("logs", 0, 10, 10);
        assert_eq!(sheet.last_row(), 0);
        assert_eq!(sheet.last_column(), 0);

        sheet.set_value(3, 4, text("x")).unwrap();
        assert_eq!(sheet.last_row(), 3);
        assert_eq!(sheet.last_column(), 4);

        sheet.clear_content(Range::row(3, 10)).unwrap();
        assert_eq!(sheet.last_row(), 0);
    }

    #[test]
    fn writes_past_the_end_grow_the_grid() {
        let mut sheet = MemorySheet::spreadsheet_create("logs", 0, 0, 0);
        sheet
            .set_values(2, 2, &[vec![text("a"), text("b")], vec![text("c"), text("d")]])
            .unwrap();
        assert_eq!((sheet.rows, sheet.cols), (3, 3));
        assert_eq!(sheet.get_value(3, 3).unwrap(), text("d"));
        assert_eq!(sheet.get_value(50, 50).unwrap(), CellValue::Empty);
    }

    #[test]
    fn writes_past_the_size_limit_fail() {
        let mut sheet = MemorySheet::spreadsheet_create("logs", 0, 2, 2);

        let err = sheet.set_value(1 << 62, 1, text("x")).unwrap_err();
        assert!(matches!(err, GridError::TooLarge { columns: 2, .. }));
        let err = sheet.set_value(MAX_ROWS + 1, 1, text("x")).unwrap_err();
        assert!(matches!(err, GridError::TooLarge { .. }));
        let err = sheet.set_value(1, MAX_COLUMNS + 1, text("x")).unwrap_err();
        assert!(matches!(err, GridError::TooLarge { .. }));
        let err = sheet.set_value(MAX_ROWS, 10, text("x")).unwrap_err();
        assert!(matches!(err, GridError::TooLarge { .. }));
        assert_eq!((sheet.rows, sheet.cols), (2, 2));
    }

    #[test]
    fn ragged_writes_are_rejected() {
        let mut sheet = MemorySheet::spreadsheet_create("logs", 0, 0, 0);
        let err = sheet
            .set_values(1, 1, &[vec![text("a"), text("b")], vec![text("c")]])
            .unwrap_err();
        assert!(matches!(err, GridError::RaggedData { row: 2, expected: 2, found: 1 }));
    }

    #[test]
    fn column_insertion_and_removal_shift_cells() {
        let mut sheet = MemorySheet::from_values(
            "logs",
            0,
            vec![vec![text("a"), text("b")], vec![text("1"), text("2")]],
        );
        sheet.insert_column_before(1).unwrap();
        assert_eq!(sheet.get_value(1, 2).unwrap(), text("a"));
        assert_eq!(sheet.get_value(1, 1).unwrap(), CellValue::Empty);

        sheet.insert_column_after(3).unwrap();
        assert_eq!(sheet.cols, 4);

        sheet.delete_column(2).unwrap();
        assert_eq!(sheet.get_value(2, 2).unwrap(), text("2"));
        assert!(sheet.delete_column(9).is_err());
    }
}
