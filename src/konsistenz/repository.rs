//! Zugriff auf den Netz-Speicher.
//!
//! Die Regeln kennen nur den Trait. Für Tests und die CLI gibt es eine
//! In-Memory-Variante, die sich aus JSON laden lässt.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::abfrage::KantenAbfrage;
use crate::core::{KantenZeile, KnotenZeile};

/// Kante aus einer Abfrage, ggf. mit der Bezeichnung der getroffenen Stufe
#[derive(Debug, Clone, PartialEq)]
pub struct KantenTreffer {
    pub kante: KantenZeile,
    pub verletzte_stufe: Option<String>,
}

/// Lesender Zugriff auf Knoten und Kanten
pub trait NetzRepository {
    fn lade_knoten(&self) -> anyhow::Result<Vec<KnotenZeile>>;

    /// Liefert alle Kanten, die die Abfrage erfüllen
    fn lade_kanten(&self, abfrage: &KantenAbfrage) -> anyhow::Result<Vec<KantenTreffer>>;
}

/// Netz vollständig im Speicher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryNetzRepository {
    #[serde(default)]
    knoten: Vec<KnotenZeile>,
    #[serde(default)]
    kanten: Vec<KantenZeile>,
}

impl InMemoryNetzRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parst ein Netz im Format `{ "knoten": [...], "kanten": [...] }`
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Netz-JSON konnte nicht gelesen werden")
    }

    /// Lädt ein Netz aus einer JSON-Datei
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Netz-Datei nicht lesbar: {}", path.display()))?;
        let netz = Self::from_json(&content)
            .with_context(|| format!("Netz-Datei ungültig: {}", path.display()))?;
        log::info!(
            "Netz geladen: {} Knoten, {} Kanten aus {}",
            netz.knoten.len(),
            netz.kanten.len(),
            path.display()
        );
        Ok(netz)
    }

    pub fn add_knoten(&mut self, knoten: KnotenZeile) {
        self.knoten.push(knoten);
    }

    pub fn add_kante(&mut self, kante: KantenZeile) {
        self.kanten.push(kante);
    }

    pub fn knoten_anzahl(&self) -> usize {
        self.knoten.len()
    }

    pub fn kanten_anzahl(&self) -> usize {
        self.kanten.len()
    }
}

impl NetzRepository for InMemoryNetzRepository {
    fn lade_knoten(&self) -> anyhow::Result<Vec<KnotenZeile>> {
        Ok(self.knoten.clone())
    }

    fn lade_kanten(&self, abfrage: &KantenAbfrage) -> anyhow::Result<Vec<KantenTreffer>> {
        Ok(self
            .kanten
            .iter()
            .filter(|k| abfrage.trifft_zu(k))
            .map(|k| KantenTreffer {
                kante: k.clone(),
                verletzte_stufe: abfrage
                    .erste_passende_stufe(k)
                    .map(|s| s.bezeichnung.clone()),
            })
            .collect())
    }
}
