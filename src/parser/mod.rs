pub mod delimited;
pub mod extract;
pub mod workbook;

use std::path::Path;

use crate::error::{AlertError, Result};
use crate::types::{AlertSource, Provider};

pub use delimited::ColtrackDelimitedParser;
pub use workbook::FagorWorkbookParser;

/// Build the parser for a provider
pub fn source_for(provider: Provider) -> Box<dyn AlertSource> {
    match provider {
        Provider::Fagor => Box::new(FagorWorkbookParser::new()),
        Provider::Coltrack => Box::new(ColtrackDelimitedParser::new()),
    }
}

/// Reject a file whose extension is not on the provider's allow-list.
/// Runs before any bytes are read.
pub fn validate_extension(provider: Provider, path: &Path) -> Result<()> {
    let allowed = provider.accepted_extensions();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match extension {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => {
            let expected = allowed
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(" o ");
            Err(AlertError::SourceFormat(format!(
                "el archivo '{}' no es válido para {}: se esperaba {}",
                path.display(),
                provider,
                expected
            )))
        }
    }
}
