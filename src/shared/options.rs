//! Zentrale Laufzeit-Konfiguration für Export und Konsistenzprüfung.
//!
//! `RadvisOptions` enthält alle zur Laufzeit änderbaren Werte.
//! Die `const`-Werte bleiben als Fallback/Default erhalten.

use serde::{Deserialize, Serialize};

use crate::core::{Envelope, QuellSystem};
use crate::konsistenz::MindestbreitenTabelle;

// ── Unterstütztes Gebiet ────────────────────────────────────────────

/// Baden-Württemberg inkl. Randzone, UTM32 Rechtswert minimal.
pub const BUNDESLAND_MIN_X: f64 = 380_000.0;
/// UTM32 Rechtswert maximal.
pub const BUNDESLAND_MAX_X: f64 = 620_000.0;
/// UTM32 Hochwert minimal.
pub const BUNDESLAND_MIN_Y: f64 = 5_250_000.0;
/// UTM32 Hochwert maximal.
pub const BUNDESLAND_MAX_Y: f64 = 5_530_000.0;

// ── Konsistenzregeln ────────────────────────────────────────────────

/// Abstand (Meter), unter dem ein Sackgassen-Knoten als "fast verbunden" gilt.
pub const VERNETZUNG_TOLERANZ_M: f64 = 1.0;

// ── Export ──────────────────────────────────────────────────────────

/// Präfix generierter Export-Dateinamen.
pub const EXPORT_PREFIX: &str = "radvis";

/// Name der Optionen-Datei neben der Binary.
const CONFIG_FILE_NAME: &str = "radvis_geo.toml";

/// Alle zur Laufzeit änderbaren Optionen.
/// Wird als `radvis_geo.toml` neben der Binary gespeichert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadvisOptions {
    // ── Export ──────────────────────────────────────────────────
    /// Präfix für generierte Dateinamen
    #[serde(default = "default_export_prefix")]
    pub export_prefix: String,

    // ── Fehlende Vernetzung ─────────────────────────────────────
    /// Toleranz in Metern
    #[serde(default = "default_vernetzung_toleranz_m")]
    pub vernetzung_toleranz_m: f64,
    /// Quelle, deren Kanten auf Vernetzung geprüft werden
    #[serde(default)]
    pub vernetzung_quelle: QuellSystem,

    // ── Transformation ──────────────────────────────────────────
    /// Unterstütztes Gebiet (UTM32) für die Achsen-Plausibilisierung
    #[serde(default = "default_bundesland_envelope")]
    pub bundesland_envelope: Envelope,

    // ── Mindestbreiten ──────────────────────────────────────────
    /// Mindestbreiten je Standard, Führungskategorie und Richtungstyp
    #[serde(default)]
    pub mindestbreiten: MindestbreitenTabelle,
}

impl Default for RadvisOptions {
    fn default() -> Self {
        Self {
            export_prefix: default_export_prefix(),
            vernetzung_toleranz_m: VERNETZUNG_TOLERANZ_M,
            vernetzung_quelle: QuellSystem::default(),
            bundesland_envelope: default_bundesland_envelope(),
            mindestbreiten: MindestbreitenTabelle::default(),
        }
    }
}

fn default_export_prefix() -> String {
    EXPORT_PREFIX.to_string()
}

fn default_vernetzung_toleranz_m() -> f64 {
    VERNETZUNG_TOLERANZ_M
}

fn default_bundesland_envelope() -> Envelope {
    Envelope::new(
        BUNDESLAND_MIN_X,
        BUNDESLAND_MAX_X,
        BUNDESLAND_MIN_Y,
        BUNDESLAND_MAX_Y,
    )
}

impl RadvisOptions {
    /// Lädt Optionen aus einer TOML-Datei. Bei Fehler: Standardwerte.
    pub fn load_from_file(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(opts) => {
                    log::info!("Optionen geladen aus: {}", path.display());
                    opts
                }
                Err(e) => {
                    log::warn!("Optionen-Datei fehlerhaft, verwende Standardwerte: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Keine Optionen-Datei gefunden, verwende Standardwerte");
                Self::default()
            }
        }
    }

    /// Speichert Optionen als TOML-Datei.
    pub fn save_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        log::info!("Optionen gespeichert nach: {}", path.display());
        Ok(())
    }

    /// Ermittelt den Pfad zur Optionen-Datei neben der Binary.
    pub fn config_path() -> std::path::PathBuf {
        std::env::current_exe()
            .unwrap_or_else(|_| std::path::PathBuf::from("radvis-geo"))
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join(CONFIG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("Temp-Verzeichnis erwartet");
        let options = RadvisOptions::load_from_file(&dir.path().join("fehlt.toml"));

        assert_eq!(options, RadvisOptions::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().expect("Temp-Verzeichnis erwartet");
        let path = dir.path().join("optionen.toml");
        std::fs::write(&path, "vernetzung_toleranz_m = 2.5\nexport_prefix = \"netz\"\n")
            .expect("Schreiben erwartet");

        let options = RadvisOptions::load_from_file(&path);

        assert_eq!(options.vernetzung_toleranz_m, 2.5);
        assert_eq!(options.export_prefix, "netz");
        assert_eq!(options.bundesland_envelope, default_bundesland_envelope());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("Temp-Verzeichnis erwartet");
        let path = dir.path().join("optionen.toml");
        let options = RadvisOptions {
            vernetzung_quelle: QuellSystem::Osm,
            ..RadvisOptions::default()
        };

        options.save_to_file(&path).expect("Speichern erwartet");
        let loaded = RadvisOptions::load_from_file(&path);

        assert_eq!(loaded, options);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("Temp-Verzeichnis erwartet");
        let path = dir.path().join("optionen.toml");
        std::fs::write(&path, "vernetzung_toleranz_m = \"viel\"").expect("Schreiben erwartet");

        assert_eq!(RadvisOptions::load_from_file(&path), RadvisOptions::default());
    }
}
