//! Geteilte Hilfen: Laufzeit-Optionen und Zahlenformatierung.

pub mod format;
pub mod options;

pub use format::{format_dezimal, format_meter};
pub use options::RadvisOptions;
pub use options::{EXPORT_PREFIX, VERNETZUNG_TOLERANZ_M};
