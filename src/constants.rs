/// Provider and sentinel constants shared across the pipeline.

// Provider identifiers (CLI, logs, metric labels)
pub const FAGOR_PROVIDER: &str = "fagor";
pub const COLTRACK_PROVIDER: &str = "coltrack";

// Session store keys holding each provider's last batch
pub const FAGOR_SESSION_KEY: &str = "fagor_alerts";
pub const COLTRACK_SESSION_KEY: &str = "coltrack_alerts";

// Accepted file extensions per provider (lowercase, no dot)
pub const FAGOR_EXTENSIONS: &[&str] = &["xlsx", "xls"];
pub const COLTRACK_EXTENSIONS: &[&str] = &["csv"];

/// Minimum speed for a record to count as an alert.
pub const SPEED_THRESHOLD_KPH: u32 = 50;
/// Lower bound of the high-speed band.
pub const HIGH_SPEED_KPH: u32 = 80;

pub const NOT_AVAILABLE: &str = "N/A";
pub const INVALID_DATE: &str = "Invalid Date";
pub const UNASSIGNED_CONTRACT: &str = "No Asignado";

/// Display layout for parsed timestamps: DD/MM/YYYY HH:MM:SS, 24-hour.
pub const TIMESTAMP_DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub const DEFAULT_TOP_N: usize = 5;

pub const EXPORT_FILE_PREFIX: &str = "reporte_alertas_velocidad_";

pub const EXPORT_HEADERS: [&str; 6] = [
    "Placa",
    "Velocidad (km/h)",
    "Fecha y Hora",
    "Operador",
    "Localidad",
    "Nombre del Contrato",
];

/// Get all supported provider names
pub fn get_supported_providers() -> Vec<&'static str> {
    vec![FAGOR_PROVIDER, COLTRACK_PROVIDER]
}
