use crate::domain::model::{Cell, SheetRow};
use crate::utils::error::{CardError, Result};
use calamine::{Data, Range, Reader, Xlsx};
use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet};
use std::io::Cursor;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// Excel 欄寬上限
const MAX_COLUMN_WIDTH: usize = 255;

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// One named worksheet; `rows[0][0]` is cell A1.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub rows: Vec<SheetRow>,
}

impl SheetData {
    pub fn new(name: impl Into<String>, rows: Vec<SheetRow>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Width of each column: longest cell (in characters) + 2.
pub fn fit_column_widths(rows: &[SheetRow]) -> Vec<usize> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);

    (0..columns)
        .map(|col| {
            let longest = rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(Cell::display_len)
                .max()
                .unwrap_or(0);
            (longest + 2).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Writes `rows` into a single-sheet xlsx document with fitted column widths.
pub fn render_workbook(sheet_name: &str, rows: &[SheetRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    write_sheet(&mut workbook, sheet_name, rows, true)?;
    Ok(workbook.save_to_buffer()?)
}

/// Writes every sheet back in order. Only `fitted_sheet` gets its column
/// widths recomputed.
pub fn render_sheets(sheets: &[SheetData], fitted_sheet: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    for sheet in sheets {
        write_sheet(
            &mut workbook,
            &sheet.name,
            &sheet.rows,
            sheet.name == fitted_sheet,
        )?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_sheet(
    workbook: &mut Workbook,
    sheet_name: &str,
    rows: &[SheetRow],
    fit_widths: bool,
) -> Result<()> {
    let date_format = Format::new().set_num_format(DATETIME_FORMAT);
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (row_index, row) in rows.iter().enumerate() {
        let row_num = u32::try_from(row_index)
            .map_err(|_| CardError::export(format!("row {} is out of range", row_index)))?;

        for (col_index, cell) in row.iter().enumerate() {
            write_cell(worksheet, row_num, column_number(col_index)?, cell, &date_format)?;
        }
    }

    if fit_widths {
        for (col_index, width) in fit_column_widths(rows).into_iter().enumerate() {
            worksheet.set_column_width(column_number(col_index)?, width as f64)?;
        }
    }

    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    date_format: &Format,
) -> Result<()> {
    match cell {
        Cell::Number(n) => {
            worksheet.write_number(row, col, *n as f64)?;
        }
        Cell::Float(f) => {
            worksheet.write_number(row, col, *f)?;
        }
        Cell::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Cell::DateTime(serial) => {
            worksheet.write_number_with_format(row, col, *serial, date_format)?;
        }
        // 空字串不寫入，保持儲存格為空
        Cell::Text(s) if s.is_empty() => {}
        Cell::Text(s) => {
            worksheet.write_string(row, col, s.as_str())?;
        }
        Cell::Formula { expression, cached } => {
            let formula = Formula::new(expression.as_str()).set_result(cached_result(cached));
            worksheet.write_formula(row, col, formula)?;
        }
    }
    Ok(())
}

fn cached_result(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) => n.to_string(),
        Cell::Float(f) | Cell::DateTime(f) => f.to_string(),
        Cell::Bool(true) => "TRUE".to_string(),
        Cell::Bool(false) => "FALSE".to_string(),
        Cell::Text(s) => s.clone(),
        Cell::Formula { cached, .. } => cached_result(cached),
    }
}

fn column_number(index: usize) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| CardError::export(format!("column {} is out of range", index)))
}

/// Reads every worksheet of an xlsx document in workbook order.
///
/// Cell positions are kept relative to A1 and formulas keep their
/// expression next to the cached result.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<SheetData>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let mut sheets = Vec::new();

    for name in workbook.sheet_names() {
        let values = workbook.worksheet_range(&name)?;
        let formulas = workbook.worksheet_formula(&name)?;

        let mut rows = anchored_rows(&values);
        if let Some((start_row, start_col)) = formulas.start() {
            for (row, col, expression) in formulas.used_cells() {
                let row = start_row as usize + row;
                let col = start_col as usize + col;
                let cached = take_cell(&mut rows, row, col);
                rows[row][col] = Cell::Formula {
                    expression: expression.clone(),
                    cached: Box::new(cached),
                };
            }
        }

        sheets.push(SheetData { name, rows });
    }

    Ok(sheets)
}

/// Reads every row of the first worksheet of an xlsx document.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<SheetRow>> {
    Ok(read_workbook(bytes)?
        .into_iter()
        .next()
        .map(|sheet| sheet.rows)
        .unwrap_or_default())
}

// calamine 的範圍從第一個非空儲存格開始，補回前方的空列與空欄
fn anchored_rows(range: &Range<Data>) -> Vec<SheetRow> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut rows: Vec<SheetRow> = vec![Vec::new(); start_row as usize];
    rows.extend(range.rows().map(|row| {
        let mut cells = vec![Cell::text(""); start_col as usize];
        cells.extend(row.iter().map(cell_from_data));
        cells
    }));
    rows
}

fn take_cell(rows: &mut Vec<SheetRow>, row: usize, col: usize) -> Cell {
    if rows.len() <= row {
        rows.resize(row + 1, Vec::new());
    }
    if rows[row].len() <= col {
        rows[row].resize(col + 1, Cell::text(""));
    }
    std::mem::replace(&mut rows[row][col], Cell::text(""))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Cell::Number(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
        Data::Empty => Cell::Text(String::new()),
        other => Cell::Text(other.to_string()),
    }
}
