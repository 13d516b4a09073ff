use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, warn};

use super::extract::{extract_speed, parse_timestamp, DateValue};
use crate::constants::{NOT_AVAILABLE, SPEED_THRESHOLD_KPH};
use crate::error::{AlertError, FieldExtractionReason, Result};
use crate::types::{AlertShell, AlertSource, Provider};

/// Accepted header spellings per logical field, tried in order
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    pub plate: &'static [&'static str],
    pub description: &'static [&'static str],
    pub date: &'static [&'static str],
    pub operator: &'static [&'static str],
    pub locality: &'static [&'static str],
}

pub const FAGOR_ALIASES: AliasTable = AliasTable {
    plate: &["Matrícula", "placa", "Placa"],
    description: &["Descripcion", "descripcion"],
    date: &["FECHA_Hora", "Fecha_Hora", "FECHA HORA"],
    operator: &["Operador"],
    locality: &["Localidad"],
};

/// Column indices for each logical field, in alias priority order.
/// Resolved once per sheet from the header row.
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    plate: Vec<usize>,
    description: Vec<usize>,
    date: Vec<usize>,
    operator: Vec<usize>,
    locality: Vec<usize>,
}

impl ColumnMap {
    fn resolve(aliases: &AliasTable, headers: &[String]) -> Self {
        let lookup = |names: &[&str]| -> Vec<usize> {
            names
                .iter()
                .filter_map(|name| headers.iter().position(|h| h == name))
                .collect()
        };
        Self {
            plate: lookup(aliases.plate),
            description: lookup(aliases.description),
            date: lookup(aliases.date),
            operator: lookup(aliases.operator),
            locality: lookup(aliases.locality),
        }
    }
}

/// First cell among `columns` holding a truthy value
fn first_truthy<'a>(row: &'a [Data], columns: &[usize]) -> Option<&'a Data> {
    columns
        .iter()
        .filter_map(|&idx| row.get(idx))
        .find(|cell| is_truthy(cell))
}

fn is_truthy(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => false,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => !s.is_empty(),
        Data::Float(f) => *f != 0.0 && !f.is_nan(),
        Data::Int(i) => *i != 0,
        Data::Bool(b) => *b,
        Data::DateTime(dt) => dt.as_f64() != 0.0,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format_number(dt.as_f64()),
    }
}

// Whole floats print without a trailing ".0" so numeric plates stay intact.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn date_value(cell: &Data) -> DateValue {
    match cell {
        Data::Float(f) => DateValue::Serial(*f),
        Data::Int(i) => DateValue::Serial(*i as f64),
        Data::DateTime(dt) => DateValue::Serial(dt.as_f64()),
        Data::DateTimeIso(s) => parse_iso(s)
            .map(DateValue::Native)
            .unwrap_or_else(|| DateValue::Text(s.clone())),
        other => DateValue::Text(cell_text(other)),
    }
}

fn parse_iso(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn apply_threshold(shell: AlertShell, row_number: usize) -> Result<AlertShell> {
    if shell.speed_kph < SPEED_THRESHOLD_KPH {
        return Err(AlertError::row_dropped(
            row_number,
            FieldExtractionReason::BelowThreshold { speed_kph: shell.speed_kph },
        ));
    }
    Ok(shell)
}

/// Parser for the Fagor workbook export (Provider A)
pub struct FagorWorkbookParser {
    aliases: AliasTable,
}

impl FagorWorkbookParser {
    pub fn new() -> Self {
        Self { aliases: FAGOR_ALIASES }
    }

    /// Map every data row of a decoded sheet. The first row is the header.
    pub fn parse_range(&self, range: &Range<Data>) -> Result<Vec<Result<AlertShell>>> {
        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|header| header.iter().map(|c| cell_text(c).trim().to_string()).collect())
            .ok_or_else(|| AlertError::SourceFormat("workbook sheet is empty".to_string()))?;
        let columns = ColumnMap::resolve(&self.aliases, &headers);
        debug!(?columns, "FagorWorkbookParser: resolved header aliases");

        // Row numbers as a spreadsheet user would see them (1-based, header included)
        let first_row = range.start().map(|(r, _)| r as usize + 1).unwrap_or(1);
        let outcomes: Vec<Result<AlertShell>> = rows
            .enumerate()
            .filter(|(_, row)| row.iter().any(is_truthy))
            .map(|(offset, row)| {
                let row_number = first_row + offset + 1;
                self.map_row(&columns, row, row_number)
                    .and_then(|shell| apply_threshold(shell, row_number))
            })
            .collect();

        if outcomes.is_empty() {
            return Err(AlertError::SourceFormat("no data rows found in workbook".to_string()));
        }
        Ok(outcomes)
    }

    fn map_row(&self, columns: &ColumnMap, row: &[Data], row_number: usize) -> Result<AlertShell> {
        let description = first_truthy(row, &columns.description)
            .map(cell_text)
            .unwrap_or_default();
        let speed_kph = extract_speed(&description).unwrap_or(0);
        if speed_kph == 0 {
            return Err(AlertError::row_dropped(row_number, FieldExtractionReason::NoSpeedSignal));
        }

        let plate = first_truthy(row, &columns.plate)
            .map(cell_text)
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        if plate.is_empty() {
            return Err(AlertError::row_dropped(row_number, FieldExtractionReason::MissingPlate));
        }

        let date = first_truthy(row, &columns.date).map(date_value);
        let text_or_na = |cols: &[usize]| {
            first_truthy(row, cols)
                .map(cell_text)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };

        Ok(AlertShell {
            plate,
            speed_kph,
            timestamp: parse_timestamp(date.as_ref()),
            operator: text_or_na(&columns.operator),
            location: text_or_na(&columns.locality),
        })
    }
}

impl Default for FagorWorkbookParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSource for FagorWorkbookParser {
    fn provider(&self) -> Provider {
        Provider::Fagor
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<Result<AlertShell>>> {
        debug!("FagorWorkbookParser: start bytes_len={}", bytes.len());
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| AlertError::SourceFormat(format!("unreadable workbook: {e}")))?;

        let sheet_names = workbook.sheet_names();
        if sheet_names.len() > 1 {
            warn!(
                "FagorWorkbookParser: {} sheets found, only '{}' is read",
                sheet_names.len(),
                sheet_names[0]
            );
        }
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AlertError::SourceFormat("workbook has no sheets".to_string()))??;

        let outcomes = self.parse_range(&range)?;
        info!("FagorWorkbookParser: mapped rows count={}", outcomes.len());
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INVALID_DATE;

    fn sheet(rows: &[Vec<Data>]) -> Range<Data> {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (rows.len() as u32 - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn header() -> Vec<Data> {
        vec![s("Matrícula"), s("Descripcion"), s("FECHA_Hora"), s("Operador"), s("Localidad")]
    }

    #[test]
    fn test_maps_row_through_aliases() {
        let range = sheet(&[
            header(),
            vec![
                s("  abc123 "),
                s("Vel. actual | Vel. permitida: 40 | 95 km/h"),
                s("05/03/2024 14:30:00"),
                s("Transportes Andinos"),
                s("4.6097, -74.0817"),
            ],
        ]);
        let rows = FagorWorkbookParser::new().parse_range(&range).unwrap();
        let shell = rows[0].as_ref().unwrap();
        assert_eq!(shell.plate, "ABC123");
        assert_eq!(shell.speed_kph, 95);
        assert_eq!(shell.timestamp, "05/03/2024 14:30:00");
        assert_eq!(shell.operator, "Transportes Andinos");
        assert_eq!(shell.location, "4.6097, -74.0817");
    }

    #[test]
    fn test_lowercase_header_variants() {
        let range = sheet(&[
            vec![s("placa"), s("descripcion"), s("Fecha_Hora")],
            vec![s("xyz987"), s("Vel. Vehiculo: 63"), Data::Float(45356.5)],
        ]);
        let rows = FagorWorkbookParser::new().parse_range(&range).unwrap();
        let shell = rows[0].as_ref().unwrap();
        assert_eq!(shell.plate, "XYZ987");
        assert_eq!(shell.speed_kph, 63);
        assert_eq!(shell.timestamp, "05/03/2024 12:00:00");
        assert_eq!(shell.operator, NOT_AVAILABLE);
        assert_eq!(shell.location, NOT_AVAILABLE);
    }

    #[test]
    fn test_empty_alias_falls_through_to_next() {
        let range = sheet(&[
            vec![s("Matrícula"), s("Placa"), s("Descripcion")],
            vec![s(""), s("def456"), s("Vel. Vehiculo: 70")],
        ]);
        let rows = FagorWorkbookParser::new().parse_range(&range).unwrap();
        assert_eq!(rows[0].as_ref().unwrap().plate, "DEF456");
    }

    #[test]
    fn test_row_without_speed_is_dropped() {
        let range = sheet(&[
            header(),
            vec![s("AAA111"), s("Encendido de motor"), s("05/03/2024")],
            vec![s("BBB222"), s("Vel. Vehiculo: 72"), s("05/03/2024")],
        ]);
        let rows = FagorWorkbookParser::new().parse_range(&range).unwrap();
        assert!(matches!(
            rows[0],
            Err(AlertError::FieldExtraction { row: 2, reason: FieldExtractionReason::NoSpeedSignal })
        ));
        assert!(rows[1].is_ok());
    }

    #[test]
    fn test_row_without_plate_is_dropped() {
        let range = sheet(&[header(), vec![Data::Empty, s("Vel. Vehiculo: 90")]]);
        let rows = FagorWorkbookParser::new().parse_range(&range).unwrap();
        assert!(matches!(
            rows[0],
            Err(AlertError::FieldExtraction { reason: FieldExtractionReason::MissingPlate, .. })
        ));
    }

    #[test]
    fn test_row_below_threshold_is_dropped() {
        let range = sheet(&[
            header(),
            vec![s("SLOW30"), s("Vel. Vehiculo: 30"), s("05/03/2024")],
            vec![s("EDGE50"), s("Vel. Vehiculo: 50"), s("05/03/2024")],
        ]);
        let rows = FagorWorkbookParser::new().parse_range(&range).unwrap();
        assert!(matches!(
            rows[0],
            Err(AlertError::FieldExtraction {
                row: 2,
                reason: FieldExtractionReason::BelowThreshold { speed_kph: 30 }
            })
        ));
        assert_eq!(rows[1].as_ref().unwrap().speed_kph, 50);
    }

    #[test]
    fn test_absent_and_unparsable_dates_differ() {
        let range = sheet(&[
            header(),
            vec![s("AAA111"), s("Vel. Vehiculo: 72"), Data::Empty],
            vec![s("BBB222"), s("Vel. Vehiculo: 72"), s("sin registro")],
        ]);
        let rows = FagorWorkbookParser::new().parse_range(&range).unwrap();
        assert_eq!(rows[0].as_ref().unwrap().timestamp, NOT_AVAILABLE);
        assert_eq!(rows[1].as_ref().unwrap().timestamp, INVALID_DATE);
    }

    #[test]
    fn test_numeric_plate_keeps_integer_text() {
        assert_eq!(cell_text(&Data::Float(4521.0)), "4521");
        assert_eq!(cell_text(&Data::Float(12.5)), "12.5");
    }

    #[test]
    fn test_header_only_sheet_is_a_format_error() {
        let range = sheet(&[header()]);
        assert!(matches!(
            FagorWorkbookParser::new().parse_range(&range),
            Err(AlertError::SourceFormat(_))
        ));
    }

    #[test]
    fn test_garbage_bytes_are_a_format_error() {
        let result = FagorWorkbookParser::new().parse(b"not a workbook at all");
        assert!(matches!(result, Err(AlertError::SourceFormat(_))));
    }
}
