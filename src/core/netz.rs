//! Domänentypen des Radnetzes, so wie sie der Netz-Speicher als Zeilen liefert.
//!
//! Geometrien kommen als WKT-Text und werden erst in den Konsistenzregeln
//! geparst, damit eine kaputte Zeile nicht die ganze Abfrage verwirft.

use serde::{Deserialize, Serialize};

/// Netzklassen einer Kante
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Netzklasse {
    RadnetzAlltag,
    RadnetzFreizeit,
    RadnetzZielnetz,
    KreisnetzAlltag,
    KreisnetzFreizeit,
    KommunalnetzAlltag,
    KommunalnetzFreizeit,
    Radschnellverbindung,
    Radvorrangrouten,
}

impl Netzklasse {
    /// Alle RadNETZ-Klassen
    pub const RADNETZ: [Netzklasse; 3] = [
        Self::RadnetzAlltag,
        Self::RadnetzFreizeit,
        Self::RadnetzZielnetz,
    ];
    /// Alle Kreisnetz-Klassen
    pub const KREISNETZ: [Netzklasse; 2] = [Self::KreisnetzAlltag, Self::KreisnetzFreizeit];
    /// Alle Kommunalnetz-Klassen
    pub const KOMMUNALNETZ: [Netzklasse; 2] =
        [Self::KommunalnetzAlltag, Self::KommunalnetzFreizeit];

    pub fn anzeigename(self) -> &'static str {
        match self {
            Self::RadnetzAlltag => "RadNETZ Alltag",
            Self::RadnetzFreizeit => "RadNETZ Freizeit",
            Self::RadnetzZielnetz => "RadNETZ Zielnetz",
            Self::KreisnetzAlltag => "Kreisnetz Alltag",
            Self::KreisnetzFreizeit => "Kreisnetz Freizeit",
            Self::KommunalnetzAlltag => "Kommunalnetz Alltag",
            Self::KommunalnetzFreizeit => "Kommunalnetz Freizeit",
            Self::Radschnellverbindung => "Radschnellverbindung",
            Self::Radvorrangrouten => "Radvorrangrouten",
        }
    }
}

/// Ausbaustandard, den eine Kante erfüllen soll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IstStandard {
    Basisstandard,
    StartstandardRadnetz,
    ZielstandardRadnetz,
    Radschnellverbindung,
    Radvorrangrouten,
}

impl IstStandard {
    pub fn anzeigename(self) -> &'static str {
        match self {
            Self::Basisstandard => "Basisstandard",
            Self::StartstandardRadnetz => "Startstandard RadNETZ",
            Self::ZielstandardRadnetz => "Zielstandard RadNETZ",
            Self::Radschnellverbindung => "Radschnellverbindung",
            Self::Radvorrangrouten => "Radvorrangrouten",
        }
    }
}

/// Art der Radverkehrsführung auf einer Kantenseite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Radverkehrsfuehrung {
    SonderwegRadweg,
    GehRadwegGetrenntStrassenbegleitend,
    GehRadwegGetrenntSelbststaendig,
    GemeinsamerGehRadwegStrassenbegleitend,
    GemeinsamerGehRadwegSelbststaendig,
    Radfahrstreifen,
    Schutzstreifen,
    Fahrradstrasse,
    PkwMischverkehrMitTempo30,
    PkwMischverkehrMitTempo50,
    PkwMischverkehrMitTempoUeber50,
    Begegnungszone,
    #[default]
    Unbekannt,
}

impl Radverkehrsfuehrung {
    /// Führungen im Mischverkehr mit dem Kfz-Verkehr
    pub const MISCHVERKEHR: [Radverkehrsfuehrung; 3] = [
        Self::PkwMischverkehrMitTempo30,
        Self::PkwMischverkehrMitTempo50,
        Self::PkwMischverkehrMitTempoUeber50,
    ];

    /// Kategorie für die Mindestbreiten-Tabelle; `None` wenn Breite nicht bewertet wird
    pub fn breiten_kategorie(self) -> Option<FuehrungsKategorie> {
        match self {
            Self::SonderwegRadweg
            | Self::GehRadwegGetrenntStrassenbegleitend
            | Self::GehRadwegGetrenntSelbststaendig => Some(FuehrungsKategorie::Radweg),
            Self::GemeinsamerGehRadwegStrassenbegleitend
            | Self::GemeinsamerGehRadwegSelbststaendig => {
                Some(FuehrungsKategorie::GemeinsamerGehRadweg)
            }
            Self::Radfahrstreifen => Some(FuehrungsKategorie::Radfahrstreifen),
            Self::Schutzstreifen => Some(FuehrungsKategorie::Schutzstreifen),
            Self::Fahrradstrasse
            | Self::PkwMischverkehrMitTempo30
            | Self::PkwMischverkehrMitTempo50
            | Self::PkwMischverkehrMitTempoUeber50
            | Self::Begegnungszone
            | Self::Unbekannt => None,
        }
    }

    pub fn ist_mischverkehr(self) -> bool {
        Self::MISCHVERKEHR.contains(&self)
    }
}

/// Führungsgruppen, für die eigene Mindestbreiten gelten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuehrungsKategorie {
    Radweg,
    GemeinsamerGehRadweg,
    Radfahrstreifen,
    Schutzstreifen,
}

/// Befahrbarkeitsrichtung relativ zur Digitalisierungsrichtung (von → nach)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Richtung {
    InRichtung,
    GegenRichtung,
    BeideRichtungen,
    #[default]
    Unbekannt,
}

impl Richtung {
    /// `true` für Einbahn-Richtungen
    pub fn ist_einrichtung(self) -> bool {
        matches!(self, Self::InRichtung | Self::GegenRichtung)
    }
}

/// Zulässige Höchstgeschwindigkeit für den Kfz-Verkehr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hoechstgeschwindigkeit {
    #[serde(rename = "MAX_SCHRITTGESCHWINDIGKEIT")]
    MaxSchrittgeschwindigkeit,
    #[serde(rename = "MAX_20_KMH")]
    Max20,
    #[serde(rename = "MAX_30_KMH")]
    Max30,
    #[serde(rename = "MAX_40_KMH")]
    Max40,
    #[serde(rename = "MAX_50_KMH")]
    Max50,
    #[serde(rename = "MAX_60_KMH")]
    Max60,
    #[serde(rename = "MAX_70_KMH")]
    Max70,
    #[serde(rename = "MAX_80_KMH")]
    Max80,
    #[serde(rename = "MAX_90_KMH")]
    Max90,
    #[serde(rename = "MAX_100_KMH")]
    Max100,
    #[serde(rename = "UEBER_100_KMH")]
    Ueber100,
    #[default]
    #[serde(rename = "UNBEKANNT")]
    Unbekannt,
}

impl Hoechstgeschwindigkeit {
    /// Obergrenze in km/h; `Ueber100` zählt als 130
    pub fn km_h(self) -> Option<u32> {
        match self {
            Self::MaxSchrittgeschwindigkeit => Some(7),
            Self::Max20 => Some(20),
            Self::Max30 => Some(30),
            Self::Max40 => Some(40),
            Self::Max50 => Some(50),
            Self::Max60 => Some(60),
            Self::Max70 => Some(70),
            Self::Max80 => Some(80),
            Self::Max90 => Some(90),
            Self::Max100 => Some(100),
            Self::Ueber100 => Some(130),
            Self::Unbekannt => None,
        }
    }
}

/// Herkunft einer Kante
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuellSystem {
    #[default]
    Dlm,
    RadNetz,
    RadVis,
    Osm,
}

/// Kantenseite bei zweiseitig erfassten Kanten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seite {
    Links,
    Rechts,
}

impl Seite {
    pub fn anzeigename(self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Rechts => "rechts",
        }
    }
}

/// Attribute einer Kantenseite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeitenAttribute {
    pub radverkehrsfuehrung: Radverkehrsfuehrung,
    /// Breite in Metern
    pub breite: Option<f64>,
    pub fahrtrichtung: Richtung,
}

/// Attributgruppen einer Kante.
///
/// Einseitige Kanten tragen ihre Werte in `links`; `rechts` wird dann ignoriert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KantenAttribute {
    pub netzklassen: Vec<Netzklasse>,
    pub ist_standards: Vec<IstStandard>,
    pub zweiseitig: bool,
    pub links: SeitenAttribute,
    pub rechts: SeitenAttribute,
    pub hoechstgeschwindigkeit: Hoechstgeschwindigkeit,
    /// Durchschnittliche tägliche Verkehrsstärke Kfz
    pub dtv_kfz: Option<u32>,
}

impl KantenAttribute {
    /// Prüft ob die Kante mindestens eine der Klassen trägt
    pub fn hat_netzklasse(&self, klassen: &[Netzklasse]) -> bool {
        self.netzklassen.iter().any(|k| klassen.contains(k))
    }

    /// Ausgewertete Seiten: bei einseitigen Kanten nur `links` ohne Seitenangabe
    pub fn seiten(&self) -> Vec<(Option<Seite>, &SeitenAttribute)> {
        if self.zweiseitig {
            vec![
                (Some(Seite::Links), &self.links),
                (Some(Seite::Rechts), &self.rechts),
            ]
        } else {
            vec![(None, &self.links)]
        }
    }

    /// Fahrtrichtung der ganzen Kante.
    ///
    /// Zweiseitige Kanten sind nur dann Einbahn, wenn beide Seiten dieselbe
    /// Einbahn-Richtung haben.
    pub fn fahrtrichtung(&self) -> Richtung {
        if !self.zweiseitig || self.links.fahrtrichtung == self.rechts.fahrtrichtung {
            return self.links.fahrtrichtung;
        }
        if self.links.fahrtrichtung == Richtung::Unbekannt
            || self.rechts.fahrtrichtung == Richtung::Unbekannt
        {
            Richtung::Unbekannt
        } else {
            Richtung::BeideRichtungen
        }
    }

    /// Prüft ob eine der ausgewerteten Seiten eine der Führungen hat
    pub fn hat_fuehrung(&self, fuehrungen: &[Radverkehrsfuehrung]) -> bool {
        self.seiten()
            .iter()
            .any(|(_, s)| fuehrungen.contains(&s.radverkehrsfuehrung))
    }

    /// Prüft ob mindestens eine ausgewertete Seite eine Breite hat
    pub fn hat_breite(&self) -> bool {
        self.seiten().iter().any(|(_, s)| s.breite.is_some())
    }
}

/// Knoten-Zeile aus dem Netz-Speicher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnotenZeile {
    pub id: u64,
    /// Punkt als WKT (UTM32)
    pub punkt: String,
}

/// Kanten-Zeile aus dem Netz-Speicher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KantenZeile {
    pub id: u64,
    pub von_knoten_id: u64,
    pub nach_knoten_id: u64,
    /// LineString als WKT (UTM32)
    pub geometrie: String,
    #[serde(default)]
    pub quelle: QuellSystem,
    #[serde(default)]
    pub attribute: KantenAttribute,
}

impl KantenZeile {
    /// Prüft ob der Knoten Start- oder Endknoten ist
    pub fn beruehrt(&self, knoten_id: u64) -> bool {
        self.von_knoten_id == knoten_id || self.nach_knoten_id == knoten_id
    }
}
