use std::borrow::Cow;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::constants::{EXPORT_FILE_PREFIX, EXPORT_HEADERS};
use crate::error::{AlertError, Result};
use crate::types::Alert;

/// Quote a field only when it holds a comma, a double quote or a newline.
pub fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Encode alerts as a comma-delimited document, header first, input order kept.
pub fn encode_alerts(alerts: &[Alert]) -> Result<String> {
    if alerts.is_empty() {
        return Err(AlertError::ExportPrecondition(
            "no hay datos filtrados para exportar".to_string(),
        ));
    }

    let mut lines = Vec::with_capacity(alerts.len() + 1);
    lines.push(EXPORT_HEADERS.join(","));
    for alert in alerts {
        let row = [
            quote_field(&alert.plate),
            Cow::Owned(alert.speed_kph.to_string()),
            quote_field(&alert.timestamp),
            quote_field(&alert.operator),
            quote_field(&alert.location),
            quote_field(&alert.contract),
        ];
        lines.push(row.join(","));
    }
    Ok(lines.join("\n"))
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("{}{}.csv", EXPORT_FILE_PREFIX, date.format("%Y-%m-%d"))
}

/// Write the export document into `output_dir`, returning the file path.
pub async fn write_export(alerts: &[Alert], output_dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    let document = encode_alerts(alerts)?;
    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(export_file_name(date));
    tokio::fs::write(&path, document).await?;
    info!(path = %path.display(), rows = alerts.len(), "Wrote alert export");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(plate: &str, operator: &str, location: &str) -> Alert {
        Alert {
            plate: plate.to_string(),
            speed_kph: 91,
            timestamp: "05/03/2024 14:30:00".to_string(),
            operator: operator.to_string(),
            location: location.to_string(),
            contract: "No Asignado".to_string(),
        }
    }

    #[test]
    fn test_quote_rule() {
        assert_eq!(quote_field(r#"A,"B""#), r#""A,""B""""#);
        assert_eq!(quote_field("linea\nnueva"), "\"linea\nnueva\"");
        assert_eq!(quote_field("ABC123"), "ABC123");
        assert_eq!(quote_field("con espacio"), "con espacio");
    }

    #[test]
    fn test_document_layout() {
        let doc = encode_alerts(&[
            alert("ABC123", "Ana Pérez", "4.61, -74.08"),
            alert("XYZ987", "N/A", "Bogotá"),
        ])
        .unwrap();
        let lines: Vec<&str> = doc.split('\n').collect();
        assert_eq!(
            lines[0],
            "Placa,Velocidad (km/h),Fecha y Hora,Operador,Localidad,Nombre del Contrato"
        );
        assert_eq!(lines[1], r#"ABC123,91,05/03/2024 14:30:00,Ana Pérez,"4.61, -74.08",No Asignado"#);
        assert_eq!(lines[2], "XYZ987,91,05/03/2024 14:30:00,N/A,Bogotá,No Asignado");
        assert!(!doc.ends_with('\n'));
    }

    #[test]
    fn test_empty_export_is_rejected() {
        assert!(matches!(encode_alerts(&[]), Err(AlertError::ExportPrecondition(_))));
    }

    #[test]
    fn test_file_name_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(export_file_name(date), "reporte_alertas_velocidad_2024-03-05.csv");
    }
}
