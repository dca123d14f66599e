// src/core/scan.rs
use anyhow::{bail, Context, Result};
use calamine::{Data, Range, Reader, Xlsx};
use log::{debug, info};
use memmap2::Mmap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Preferred data entry sheet name in German seller templates.
const DATA_SHEET_NAME: &str = "Vorlage";

/// Minimum dimensions for the data-sheet fallback heuristic.
const MIN_DATA_SHEET_ROWS: u32 = 10;
const MIN_DATA_SHEET_COLS: usize = 10;

/// Read-only view of one worksheet. Rows are 1-based throughout (matching
/// what users see in a spreadsheet), columns are zero-based indices.
pub struct SheetGrid {
    name: String,
    range: Range<Data>,
}

impl SheetGrid {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows up to and including the last populated one.
    pub fn max_row(&self) -> u32 {
        self.range.end().map(|(r, _)| r + 1).unwrap_or(0)
    }

    /// Number of columns up to and including the last populated one.
    pub fn max_col(&self) -> usize {
        self.range.end().map(|(_, c)| c as usize + 1).unwrap_or(0)
    }

    /// Raw cell value, or None outside the populated area.
    pub fn cell_value(&self, row: u32, col: usize) -> Option<&Data> {
        if row == 0 {
            return None;
        }
        self.range.get_value((row - 1, col as u32))
    }

    /// Trimmed cell text; None for blank or whitespace-only cells.
    pub fn cell_text(&self, row: u32, col: usize) -> Option<String> {
        let value = self.cell_value(row, col)?;
        let text = data_to_text(value);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// All populated cells of one row as column index -> trimmed text.
    pub fn populated_cells(&self, row: u32) -> BTreeMap<usize, String> {
        (0..self.max_col())
            .filter_map(|col| self.cell_text(row, col).map(|text| (col, text)))
            .collect()
    }
}

/// Render a cell value the way it reads in the sheet. Integral floats lose
/// the trailing ".0" so numeric SKUs and EANs match their text form.
pub fn data_to_text(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERROR:{:?}", e),
    }
}

/// Opens a macro-enabled workbook for read-only structural scanning. The
/// macro payload and formulas travel opaquely in the original bytes; this
/// type only ever looks at cell values, sheet names and defined names.
pub struct WorkbookScanner {
    xlsx: Xlsx<Cursor<Vec<u8>>>,
}

impl WorkbookScanner {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let xlsx = Xlsx::new(Cursor::new(bytes)).context("failed to open workbook")?;
        Ok(Self { xlsx })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = read_workbook_bytes(path)?;
        Self::from_bytes(bytes)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.xlsx.sheet_names().to_vec()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.xlsx.sheet_names().iter().any(|n| n == name)
    }

    /// Workbook-level defined names as (name, range reference) pairs.
    pub fn defined_names(&self) -> Vec<(String, String)> {
        self.xlsx.defined_names().to_vec()
    }

    pub fn grid(&mut self, name: &str) -> Result<SheetGrid> {
        let range = self
            .xlsx
            .worksheet_range(name)
            .with_context(|| format!("failed to read sheet '{}'", name))?;
        Ok(SheetGrid {
            name: name.to_string(),
            range,
        })
    }

    /// Find the main data entry sheet: "Vorlage" by exact name, then any
    /// sheet containing "vorlage", then the first sheet big enough to
    /// plausibly hold product rows.
    pub fn find_data_sheet(&mut self) -> Result<String> {
        let names = self.sheet_names();

        if names.iter().any(|n| n == DATA_SHEET_NAME) {
            return Ok(DATA_SHEET_NAME.to_string());
        }
        if let Some(name) = names
            .iter()
            .find(|n| n.to_lowercase().contains("vorlage"))
        {
            return Ok(name.clone());
        }

        for name in &names {
            let grid = self.grid(name)?;
            if grid.max_row() > MIN_DATA_SHEET_ROWS && grid.max_col() > MIN_DATA_SHEET_COLS {
                debug!("falling back to data sheet '{}' by size", name);
                return Ok(name.clone());
            }
        }

        bail!("unrecognized template: could not find a data entry sheet")
    }
}

/// Read a workbook file into memory, memory-mapping files over 10 MB.
pub fn read_workbook_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("cannot stat {}", path.display()))?;

    if metadata.len() > 10 * 1024 * 1024 {
        info!(
            "memory-mapping large workbook ({} bytes): {}",
            metadata.len(),
            path.display()
        );
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(mmap.to_vec())
    } else {
        Ok(std::fs::read(path)?)
    }
}

#[cfg(test)]
pub(crate) fn grid_from_cells(name: &str, cells: &[(u32, usize, &str)]) -> SheetGrid {
    let max_row = cells.iter().map(|(r, _, _)| *r).max().unwrap_or(1);
    let max_col = cells.iter().map(|(_, c, _)| *c).max().unwrap_or(0);
    let mut range: Range<Data> = Range::new((0, 0), (max_row - 1, max_col as u32));
    for (row, col, text) in cells {
        range.set_value((*row - 1, *col as u32), Data::String(text.to_string()));
    }
    SheetGrid {
        name: name.to_string(),
        range,
    }
}
