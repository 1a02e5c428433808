//! RadVIS Geo-Kern Kommandozeile.
//!
//! Prüft ein Radnetz auf Konsistenz und konvertiert Geodaten in die
//! Exportformate CSV, GeoJSON, GeoPackage und Shapefile.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use radvis_geo_core::export::GeoJsonConverter;
use radvis_geo_core::{
    CoordinateReferenceSystemConverter, ExportData, ExportFormat, InMemoryNetzRepository,
    KonsistenzregelRegistry, RadvisOptions,
};

#[derive(Parser)]
#[command(name = "radvis-geo")]
#[command(about = "Konsistenzprüfung und Geo-Export für das RadVIS-Radnetz")]
#[command(version)]
struct Cli {
    /// Optionen-Datei (TOML); Standard: radvis_geo.toml neben der Binary
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Netz prüfen und Verletzungen exportieren
    Pruefen {
        /// Netz als JSON ({ "knoten": [...], "kanten": [...] })
        #[arg(long)]
        netz: PathBuf,
        /// Nur diese Regeln ausführen (mehrfach angebbar)
        #[arg(long = "regel")]
        regeln: Vec<String>,
        #[arg(long, value_enum, default_value = "geojson")]
        format: Format,
        /// Zielverzeichnis
        #[arg(long, default_value = ".")]
        ausgabe: PathBuf,
    },

    /// GeoJSON nach UTM32 bringen und in ein Exportformat schreiben
    Konvertieren {
        #[arg(long)]
        eingabe: PathBuf,
        #[arg(long, value_enum)]
        format: Format,
        #[arg(long, default_value = ".")]
        ausgabe: PathBuf,
    },

    /// Registrierte Regeln auflisten
    Regeln,

    /// Aktuelle Optionen in die Optionen-Datei schreiben
    Konfiguration,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Geojson,
    Geopackage,
    Shp,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => ExportFormat::Csv,
            Format::Geojson => ExportFormat::GeoJson,
            Format::Geopackage => ExportFormat::GeoPackage,
            Format::Shp => ExportFormat::Shapefile,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(RadvisOptions::config_path);
    let options = RadvisOptions::load_from_file(&config_path);

    match cli.command {
        Command::Pruefen {
            netz,
            regeln,
            format,
            ausgabe,
        } => pruefen(&options, &netz, &regeln, format.into(), &ausgabe),
        Command::Konvertieren {
            eingabe,
            format,
            ausgabe,
        } => konvertieren(&options, &eingabe, format.into(), &ausgabe),
        Command::Regeln => regeln_auflisten(&options),
        Command::Konfiguration => options.save_to_file(&config_path),
    }
}

fn pruefen(
    options: &RadvisOptions,
    netz: &Path,
    regeln: &[String],
    format: ExportFormat,
    ausgabe: &Path,
) -> Result<()> {
    let repository = Arc::new(InMemoryNetzRepository::load_from_file(netz)?);
    let registry = KonsistenzregelRegistry::standard(repository, options)?;

    let ergebnis = if regeln.is_empty() {
        registry.pruefe_alle()
    } else {
        registry.pruefe(regeln)?
    };
    for (typ, fehler) in &ergebnis.fehler {
        log::error!("Regel {} konnte nicht geprüft werden: {}", typ, fehler);
    }

    schreibe_export(options, &ergebnis.to_export_data(), format, ausgabe)
}

fn konvertieren(
    options: &RadvisOptions,
    eingabe: &Path,
    format: ExportFormat,
    ausgabe: &Path,
) -> Result<()> {
    let text = std::fs::read_to_string(eingabe)
        .with_context(|| format!("Eingabe nicht lesbar: {}", eingabe.display()))?;
    let features = GeoJsonConverter::read_feature_collection(&text)
        .with_context(|| format!("Eingabe ist kein gültiges GeoJSON: {}", eingabe.display()))?;

    let converter = CoordinateReferenceSystemConverter::new(options.bundesland_envelope);
    let utm32 = features
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            converter
                .to_utm32_mit_achsenkorrektur(feature.geometry())
                .map(|g| feature.with_geometry(g))
                .with_context(|| format!("Feature {} nicht transformierbar", i))
        })
        .collect::<Result<Vec<ExportData>>>()?;
    log::info!("{} Features nach UTM32 transformiert", utm32.len());

    schreibe_export(options, &utm32, format, ausgabe)
}

fn schreibe_export(
    options: &RadvisOptions,
    data: &[ExportData],
    format: ExportFormat,
    ausgabe: &Path,
) -> Result<()> {
    let bytes = format
        .converter()
        .convert(data)
        .with_context(|| format!("Export nach {} fehlgeschlagen", format.kuerzel()))?;

    std::fs::create_dir_all(ausgabe)
        .with_context(|| format!("Ausgabeverzeichnis nicht anlegbar: {}", ausgabe.display()))?;
    let path = ausgabe.join(format.dateiname_heute(&options.export_prefix));
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Datei nicht schreibbar: {}", path.display()))?;

    log::info!(
        "{} Datensätze exportiert: {} ({} Bytes)",
        data.len(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

fn regeln_auflisten(options: &RadvisOptions) -> Result<()> {
    let registry =
        KonsistenzregelRegistry::standard(Arc::new(InMemoryNetzRepository::new()), options)?;
    for regel in registry.regeln() {
        println!(
            "{:<24} {:<12} {}",
            regel.verletzungs_typ(),
            regel.gruppe().anzeigename(),
            regel.titel()
        );
    }
    Ok(())
}
