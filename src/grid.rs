use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One spreadsheet cell after loader coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY: Cell = Cell::Empty;

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Trimmed display text. Integral numbers print without a fractional part.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(v) => format_number(*v),
        }
    }

    /// Lenient numeric read: the longest leading decimal prefix of the text, like a spreadsheet
    /// `VALUE` that tolerates trailing junk ("10 marks" -> 10).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(v) if v.is_finite() => Some(*v),
            Cell::Number(_) => None,
            Cell::Text(s) => leading_float(s.trim()),
        }
    }

    /// Mark coercion: blank or non-numeric content reads as 0.
    pub fn mark_value(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Integer value if the cell holds a whole number.
    pub fn as_integer(&self) -> Option<i64> {
        let v = self.as_number()?;
        if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            Some(v as i64)
        } else {
            None
        }
    }
}

fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn leading_float(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let int_digits = end - digits_start;
    let mut frac_digits = 0;
    if end < bytes.len() && bytes[end] == b'.' {
        let mut k = end + 1;
        while k < bytes.len() && bytes[k].is_ascii_digit() {
            k += 1;
        }
        frac_digits = k - end - 1;
        if int_digits + frac_digits > 0 {
            end = k;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    // Exponent only counts when it is complete.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut k = end + 1;
        if k < bytes.len() && (bytes[k] == b'+' || bytes[k] == b'-') {
            k += 1;
        }
        let exp_start = k;
        while k < bytes.len() && bytes[k].is_ascii_digit() {
            k += 1;
        }
        if k > exp_start {
            end = k;
        }
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Number(v) => serializer.serialize_f64(*v),
        }
    }
}

struct CellVisitor;

impl<'de> Visitor<'de> for CellVisitor {
    type Value = Cell;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("null, a string, a number or a boolean")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Cell, E> {
        Ok(Cell::Empty)
    }

    fn visit_none<E: de::Error>(self) -> Result<Cell, E> {
        Ok(Cell::Empty)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Cell, E> {
        Ok(Cell::Number(if v { 1.0 } else { 0.0 }))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Cell, E> {
        Ok(Cell::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Cell, E> {
        Ok(Cell::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Cell, E> {
        Ok(Cell::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Cell, E> {
        if v.is_empty() {
            Ok(Cell::Empty)
        } else {
            Ok(Cell::Text(v.to_string()))
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CellVisitor)
    }
}

/// Row-major sheet contents. Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        self.rows.get(row).map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn row_len(&self, row: usize) -> usize {
        self.row(row).len()
    }

    /// Cells joined by spaces, lower-cased.
    pub fn row_text(&self, row: usize) -> String {
        self.row(row)
            .iter()
            .map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl From<Vec<Vec<Cell>>> for Grid {
    fn from(rows: Vec<Vec<Cell>>) -> Self {
        Grid::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_reads_empty() {
        let g = Grid::new(vec![vec![Cell::text("a")], vec![]]);
        assert_eq!(g.cell(0, 0), &Cell::text("a"));
        assert_eq!(g.cell(0, 5), &Cell::Empty);
        assert_eq!(g.cell(9, 0), &Cell::Empty);
        assert!(g.row(7).is_empty());
    }

    #[test]
    fn lenient_number_parse() {
        assert_eq!(Cell::text("10").as_number(), Some(10.0));
        assert_eq!(Cell::text(" 7.5 ").as_number(), Some(7.5));
        assert_eq!(Cell::text("8 marks").as_number(), Some(8.0));
        assert_eq!(Cell::text(".5").as_number(), Some(0.5));
        assert_eq!(Cell::text("1e").as_number(), Some(1.0));
        assert_eq!(Cell::text("abs").as_number(), None);
        assert_eq!(Cell::text("-").as_number(), None);
        assert_eq!(Cell::Empty.as_number(), None);
    }

    #[test]
    fn mark_value_defaults_to_zero() {
        assert_eq!(Cell::Empty.mark_value(), 0.0);
        assert_eq!(Cell::text("absent").mark_value(), 0.0);
        assert_eq!(Cell::Number(4.5).mark_value(), 4.5);
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(1.0).as_text(), "1");
        assert_eq!(Cell::Number(2.5).as_text(), "2.5");
        assert_eq!(Cell::text("  CT-1 ").as_text(), "CT-1");
    }

    #[test]
    fn deserializes_mixed_json_rows() {
        let g: Grid = serde_json::from_str(r#"[["ID", 1, null, true, ""]]"#).expect("grid");
        assert_eq!(g.cell(0, 0), &Cell::text("ID"));
        assert_eq!(g.cell(0, 1), &Cell::Number(1.0));
        assert_eq!(g.cell(0, 2), &Cell::Empty);
        assert_eq!(g.cell(0, 3), &Cell::Number(1.0));
        assert_eq!(g.cell(0, 4), &Cell::Empty);
        assert_eq!(g.row_text(0), "id 1  1 ");
    }
}
