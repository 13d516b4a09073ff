use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, info};

use crate::constants::{NOT_AVAILABLE, SPEED_THRESHOLD_KPH};
use crate::error::{AlertError, FieldExtractionReason, Result};
use crate::types::{AlertShell, AlertSource, Provider};

const DELIMITER: u8 = b'|';
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header names of the Coltrack export
pub mod columns {
    pub const PLATE: &str = "Nombre";
    pub const SPEED: &str = "kph";
    pub const REPORT_TIME: &str = "Hora Reporte";
    pub const DRIVER_NAME: &str = "Nombre Conductor";
    pub const DRIVER_SURNAME: &str = "Apellido";
    pub const LATITUDE: &str = "Lat";
    pub const LONGITUDE: &str = "Lon";
}

#[derive(Debug, Default)]
struct HeaderIndex {
    plate: Option<usize>,
    speed: Option<usize>,
    report_time: Option<usize>,
    driver_name: Option<usize>,
    driver_surname: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
}

impl HeaderIndex {
    fn resolve(headers: &[String]) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Self {
            plate: find(columns::PLATE),
            speed: find(columns::SPEED),
            report_time: find(columns::REPORT_TIME),
            driver_name: find(columns::DRIVER_NAME),
            driver_surname: find(columns::DRIVER_SURNAME),
            latitude: find(columns::LATITUDE),
            longitude: find(columns::LONGITUDE),
        }
    }
}

/// Parse a leading integer the way a lenient report reader would:
/// optional sign then digits, anything after is ignored. No digits gives 0.
pub fn parse_leading_int(text: &str) -> i64 {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// Parser for the Coltrack pipe-delimited export (Provider B)
pub struct ColtrackDelimitedParser;

impl ColtrackDelimitedParser {
    pub fn new() -> Self {
        Self
    }

    fn map_row(&self, index: &HeaderIndex, record: &ByteRecord, row_number: usize) -> Result<AlertShell> {
        let field = |idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i))
                .map(|raw| String::from_utf8_lossy(raw).into_owned())
                .unwrap_or_default()
        };

        let plate = field(index.plate).trim().to_uppercase();
        if plate.is_empty() {
            return Err(AlertError::row_dropped(row_number, FieldExtractionReason::MissingPlate));
        }

        let speed = parse_leading_int(&field(index.speed)).clamp(0, u32::MAX as i64) as u32;
        if speed < SPEED_THRESHOLD_KPH {
            return Err(AlertError::row_dropped(
                row_number,
                FieldExtractionReason::BelowThreshold { speed_kph: speed },
            ));
        }

        let report_time = field(index.report_time);
        let timestamp = if report_time.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            report_time
        };

        let operator = format!("{} {}", field(index.driver_name), field(index.driver_surname))
            .trim()
            .to_string();
        let operator = if operator.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            operator
        };

        let lat = field(index.latitude);
        let lon = field(index.longitude);
        let location = if !lat.trim().is_empty() && !lon.trim().is_empty() {
            format!("{}, {}", lat.trim(), lon.trim())
        } else {
            NOT_AVAILABLE.to_string()
        };

        Ok(AlertShell {
            plate,
            speed_kph: speed,
            timestamp,
            operator,
            location,
        })
    }
}

impl Default for ColtrackDelimitedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSource for ColtrackDelimitedParser {
    fn provider(&self) -> Provider {
        Provider::Coltrack
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<Result<AlertShell>>> {
        debug!("ColtrackDelimitedParser: start bytes_len={}", bytes.len());
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(AlertError::SourceFormat("no header row found".to_string()));
        }
        if headers.len() == 1 && headers[0].contains([',', ';', '\t']) {
            return Err(AlertError::SourceFormat(
                "expected '|' delimited columns, found a single column".to_string(),
            ));
        }
        let index = HeaderIndex::resolve(&headers);
        debug!(?index, "ColtrackDelimitedParser: resolved header columns");

        let mut outcomes = Vec::new();
        for (i, record) in reader.byte_records().enumerate() {
            let record = record?;
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(i + 2);
            outcomes.push(self.map_row(&index, &record, row_number));
        }

        if outcomes.is_empty() {
            return Err(AlertError::SourceFormat("no data rows found in delimited export".to_string()));
        }
        info!("ColtrackDelimitedParser: mapped rows count={}", outcomes.len());
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Nombre|kph|Hora Reporte|Nombre Conductor|Apellido|Lat|Lon";

    fn parse(text: &str) -> Vec<Result<AlertShell>> {
        ColtrackDelimitedParser::new().parse(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_maps_full_row() {
        let text = format!("{HEADER}\n abc123 |82|05/03/2024 14:30:00|Ana|Pérez| 4.61 |-74.08 \n");
        let rows = parse(&text);
        let shell = rows[0].as_ref().unwrap();
        assert_eq!(shell.plate, "ABC123");
        assert_eq!(shell.speed_kph, 82);
        assert_eq!(shell.timestamp, "05/03/2024 14:30:00");
        assert_eq!(shell.operator, "Ana Pérez");
        assert_eq!(shell.location, "4.61, -74.08");
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let text = format!("{HEADER}\n\nAAA111|60||||| \n\n");
        let rows = parse(&text);
        assert_eq!(rows.len(), 1);
        let shell = rows[0].as_ref().unwrap();
        assert_eq!(shell.timestamp, NOT_AVAILABLE);
        assert_eq!(shell.operator, NOT_AVAILABLE);
        assert_eq!(shell.location, NOT_AVAILABLE);
    }

    #[test]
    fn test_operator_with_only_surname_is_trimmed() {
        let text = format!("{HEADER}\nAAA111|60|||Gómez||");
        assert_eq!(parse(&text)[0].as_ref().unwrap().operator, "Gómez");
    }

    #[test]
    fn test_location_needs_both_coordinates() {
        let text = format!("{HEADER}\nAAA111|60||||4.61|");
        assert_eq!(parse(&text)[0].as_ref().unwrap().location, NOT_AVAILABLE);
    }

    #[test]
    fn test_slow_and_unparsable_speeds_are_dropped() {
        let text = format!("{HEADER}\nAAA111|49|||||\nBBB222|rápido|||||\nCCC333|50|||||");
        let rows = parse(&text);
        assert!(matches!(
            rows[0],
            Err(AlertError::FieldExtraction {
                reason: FieldExtractionReason::BelowThreshold { speed_kph: 49 },
                ..
            })
        ));
        assert!(matches!(
            rows[1],
            Err(AlertError::FieldExtraction {
                reason: FieldExtractionReason::BelowThreshold { speed_kph: 0 },
                ..
            })
        ));
        assert_eq!(rows[2].as_ref().unwrap().speed_kph, 50);
    }

    #[test]
    fn test_empty_plate_is_dropped() {
        let text = format!("{HEADER}\n  |90|||||");
        assert!(matches!(
            parse(&text)[0],
            Err(AlertError::FieldExtraction { reason: FieldExtractionReason::MissingPlate, .. })
        ));
    }

    #[test]
    fn test_short_rows_default_missing_fields() {
        let text = format!("{HEADER}\nDEF456|77");
        let shell = parse(&text).remove(0).unwrap();
        assert_eq!(shell.plate, "DEF456");
        assert_eq!(shell.operator, NOT_AVAILABLE);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(parse_leading_int("82"), 82);
        assert_eq!(parse_leading_int(" 82.7"), 82);
        assert_eq!(parse_leading_int("95kph"), 95);
        assert_eq!(parse_leading_int("-12"), -12);
        assert_eq!(parse_leading_int("kph"), 0);
        assert_eq!(parse_leading_int(""), 0);
    }

    #[test]
    fn test_comma_delimited_file_is_rejected() {
        let result = ColtrackDelimitedParser::new().parse(b"Nombre,kph,Lat\nABC,90,1");
        assert!(matches!(result, Err(AlertError::SourceFormat(_))));
    }

    #[test]
    fn test_empty_document_is_rejected() {
        assert!(matches!(
            ColtrackDelimitedParser::new().parse(b""),
            Err(AlertError::SourceFormat(_))
        ));
        assert!(matches!(
            ColtrackDelimitedParser::new().parse(HEADER.as_bytes()),
            Err(AlertError::SourceFormat(_))
        ));
    }
}
