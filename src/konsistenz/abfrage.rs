//! Parametrisierter Abfrage-Builder für Kanten.
//!
//! Dieselbe Bedingung lässt sich als SQL mit `$n`-Platzhaltern rendern
//! (für einen PostGIS-Speicher) oder direkt im Speicher auswerten.
//! Stufen bilden eine `CASE`-Kaskade: die erste passende Stufe gewinnt.

use serde::Serialize;

use crate::core::{KantenZeile, Netzklasse, QuellSystem, Radverkehrsfuehrung, Richtung};

/// Eine Schwellwert-Stufe aus Geschwindigkeitsbereich und DTV-Grenze
#[derive(Debug, Clone, PartialEq)]
pub struct StandardStufe {
    /// Text, der in die Verletzungsbeschreibung übernommen wird
    pub bezeichnung: String,
    /// Untere Geschwindigkeitsgrenze (inklusive)
    pub min_kmh: u32,
    /// Obere Geschwindigkeitsgrenze (inklusive), `None` = offen
    pub max_kmh: Option<u32>,
    /// Die Stufe greift erst oberhalb dieser Verkehrsstärke
    pub dtv_schwelle: u32,
}

impl StandardStufe {
    pub fn new(bezeichnung: impl Into<String>, min_kmh: u32, max_kmh: Option<u32>, dtv_schwelle: u32) -> Self {
        Self {
            bezeichnung: bezeichnung.into(),
            min_kmh,
            max_kmh,
            dtv_schwelle,
        }
    }

    /// Unbekannte Geschwindigkeit oder unbekannter DTV passen nie
    pub fn passt(&self, kante: &KantenZeile) -> bool {
        let attribute = &kante.attribute;
        let (Some(kmh), Some(dtv)) = (attribute.hoechstgeschwindigkeit.km_h(), attribute.dtv_kfz) else {
            return false;
        };
        kmh >= self.min_kmh && self.max_kmh.is_none_or(|max| kmh <= max) && dtv > self.dtv_schwelle
    }
}

/// Gebundener Parameterwert
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParameter {
    Text(String),
    TextListe(Vec<String>),
    Ganzzahl(i64),
}

/// Gerendertes Statement mit Parametern in Platzhalter-Reihenfolge
#[derive(Debug, Clone, PartialEq)]
pub struct ParametrisierteAbfrage {
    pub sql: String,
    pub parameter: Vec<SqlParameter>,
}

impl ParametrisierteAbfrage {
    /// Bindet einen Parameter und liefert seinen Platzhalter
    fn binde(&mut self, parameter: SqlParameter) -> String {
        self.parameter.push(parameter);
        format!("${}", self.parameter.len())
    }
}

/// Name eines Enum-Werts, wie er im Speicher steht (`SCREAMING_SNAKE_CASE`)
fn sql_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

fn sql_namen<T: Serialize>(values: &[T]) -> Vec<String> {
    values.iter().map(sql_name).collect()
}

/// Bedingungen einer Kantenabfrage; leere Filter schränken nicht ein
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KantenAbfrage {
    netzklassen: Vec<Netzklasse>,
    quelle: Option<QuellSystem>,
    fuehrungen: Vec<Radverkehrsfuehrung>,
    nur_einrichtung: bool,
    nur_mit_breite: bool,
    nur_mit_standard: bool,
    stufen: Vec<StandardStufe>,
}

impl KantenAbfrage {
    /// Alle Kanten
    pub fn alle() -> Self {
        Self::default()
    }

    /// Kante trägt mindestens eine der Klassen
    pub fn mit_netzklassen(mut self, netzklassen: &[Netzklasse]) -> Self {
        self.netzklassen = netzklassen.to_vec();
        self
    }

    pub fn mit_quelle(mut self, quelle: QuellSystem) -> Self {
        self.quelle = Some(quelle);
        self
    }

    /// Eine ausgewertete Seite hat eine der Führungen
    pub fn mit_fuehrungen(mut self, fuehrungen: &[Radverkehrsfuehrung]) -> Self {
        self.fuehrungen = fuehrungen.to_vec();
        self
    }

    pub fn nur_einrichtung(mut self) -> Self {
        self.nur_einrichtung = true;
        self
    }

    pub fn nur_mit_breite(mut self) -> Self {
        self.nur_mit_breite = true;
        self
    }

    pub fn nur_mit_standard(mut self) -> Self {
        self.nur_mit_standard = true;
        self
    }

    /// Stufen-Kaskade; nur Kanten mit passender Stufe werden geliefert
    pub fn mit_stufen(mut self, stufen: Vec<StandardStufe>) -> Self {
        self.stufen = stufen;
        self
    }

    pub fn stufen(&self) -> &[StandardStufe] {
        &self.stufen
    }

    /// Erste passende Stufe (Reihenfolge der Kaskade)
    pub fn erste_passende_stufe(&self, kante: &KantenZeile) -> Option<&StandardStufe> {
        self.stufen.iter().find(|s| s.passt(kante))
    }

    /// Wertet die Bedingung im Speicher aus
    pub fn trifft_zu(&self, kante: &KantenZeile) -> bool {
        let attribute = &kante.attribute;

        if !self.netzklassen.is_empty() && !attribute.hat_netzklasse(&self.netzklassen) {
            return false;
        }
        if self.quelle.is_some_and(|q| q != kante.quelle) {
            return false;
        }
        if !self.fuehrungen.is_empty() && !attribute.hat_fuehrung(&self.fuehrungen) {
            return false;
        }
        if self.nur_einrichtung && !attribute.fahrtrichtung().ist_einrichtung() {
            return false;
        }
        if self.nur_mit_breite && !attribute.hat_breite() {
            return false;
        }
        if self.nur_mit_standard && attribute.ist_standards.is_empty() {
            return false;
        }
        self.stufen.is_empty() || self.erste_passende_stufe(kante).is_some()
    }

    /// Rendert die Abfrage gegen die Tabelle `kante`
    pub fn to_sql(&self) -> ParametrisierteAbfrage {
        let mut abfrage = ParametrisierteAbfrage {
            sql: String::new(),
            parameter: Vec::new(),
        };
        let mut bedingungen: Vec<String> = Vec::new();

        if !self.netzklassen.is_empty() {
            let p = abfrage.binde(SqlParameter::TextListe(sql_namen(&self.netzklassen)));
            bedingungen.push(format!("k.netzklassen && {}::text[]", p));
        }
        if let Some(quelle) = self.quelle {
            let p = abfrage.binde(SqlParameter::Text(sql_name(&quelle)));
            bedingungen.push(format!("k.quelle = {}", p));
        }
        if !self.fuehrungen.is_empty() {
            let p = abfrage.binde(SqlParameter::TextListe(sql_namen(&self.fuehrungen)));
            bedingungen.push(format!(
                "(k.radverkehrsfuehrung_links = ANY({p}) OR (k.zweiseitig AND k.radverkehrsfuehrung_rechts = ANY({p})))"
            ));
        }
        if self.nur_einrichtung {
            let p = abfrage.binde(SqlParameter::TextListe(sql_namen(&[
                Richtung::InRichtung,
                Richtung::GegenRichtung,
            ])));
            // Zweiseitige Kanten nur, wenn beide Seiten dieselbe Richtung haben
            bedingungen.push(format!(
                "(k.fahrtrichtung_links = ANY({p}) AND (NOT k.zweiseitig OR k.fahrtrichtung_rechts = k.fahrtrichtung_links))"
            ));
        }
        if self.nur_mit_breite {
            bedingungen.push(
                "(k.breite_links IS NOT NULL OR (k.zweiseitig AND k.breite_rechts IS NOT NULL))"
                    .to_string(),
            );
        }
        if self.nur_mit_standard {
            bedingungen.push("cardinality(k.ist_standards) > 0".to_string());
        }

        let stufen_spalte = if self.stufen.is_empty() {
            "NULL".to_string()
        } else {
            let mut case = String::from("CASE");
            for stufe in &self.stufen {
                let min = abfrage.binde(SqlParameter::Ganzzahl(i64::from(stufe.min_kmh)));
                case.push_str(&format!(" WHEN k.hoechstgeschwindigkeit_kmh >= {}", min));
                if let Some(max_kmh) = stufe.max_kmh {
                    let max = abfrage.binde(SqlParameter::Ganzzahl(i64::from(max_kmh)));
                    case.push_str(&format!(" AND k.hoechstgeschwindigkeit_kmh <= {}", max));
                }
                let dtv = abfrage.binde(SqlParameter::Ganzzahl(i64::from(stufe.dtv_schwelle)));
                let text = abfrage.binde(SqlParameter::Text(stufe.bezeichnung.clone()));
                case.push_str(&format!(" AND k.dtv_kfz > {} THEN {}", dtv, text));
            }
            case.push_str(" END");
            case
        };

        let where_clause = if bedingungen.is_empty() {
            "TRUE".to_string()
        } else {
            bedingungen.join(" AND ")
        };
        let inner = format!(
            "SELECT k.id, k.von_knoten_id, k.nach_knoten_id, ST_AsText(k.geometry) AS geometrie, \
             {} AS verletzte_stufe FROM kante k WHERE {}",
            stufen_spalte, where_clause
        );

        abfrage.sql = if self.stufen.is_empty() {
            inner
        } else {
            format!(
                "SELECT * FROM ({}) AS kandidaten WHERE kandidaten.verletzte_stufe IS NOT NULL",
                inner
            )
        };
        abfrage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Hoechstgeschwindigkeit, KantenAttribute};

    fn kante(kmh: Hoechstgeschwindigkeit, dtv: Option<u32>) -> KantenZeile {
        KantenZeile {
            id: 1,
            von_knoten_id: 1,
            nach_knoten_id: 2,
            geometrie: "LINESTRING (0 0, 1 1)".to_string(),
            quelle: QuellSystem::Dlm,
            attribute: KantenAttribute {
                netzklassen: vec![Netzklasse::RadnetzAlltag],
                hoechstgeschwindigkeit: kmh,
                dtv_kfz: dtv,
                ..Default::default()
            },
        }
    }

    fn stufen() -> Vec<StandardStufe> {
        vec![
            StandardStufe::new("bis 30", 0, Some(30), 8000),
            StandardStufe::new("40 bis 50", 31, Some(50), 5000),
            StandardStufe::new("ueber 50", 51, None, 2500),
        ]
    }

    #[test]
    fn empty_query_renders_all_edges() {
        let abfrage = KantenAbfrage::alle().to_sql();

        assert_eq!(
            abfrage.sql,
            "SELECT k.id, k.von_knoten_id, k.nach_knoten_id, ST_AsText(k.geometry) AS geometrie, \
             NULL AS verletzte_stufe FROM kante k WHERE TRUE"
        );
        assert!(abfrage.parameter.is_empty());
    }

    #[test]
    fn conditions_use_numbered_placeholders() {
        let abfrage = KantenAbfrage::alle()
            .mit_netzklassen(&Netzklasse::KREISNETZ)
            .mit_quelle(QuellSystem::Osm)
            .to_sql();

        assert!(abfrage.sql.contains("k.netzklassen && $1::text[] AND k.quelle = $2"));
        assert_eq!(
            abfrage.parameter,
            vec![
                SqlParameter::TextListe(vec![
                    "KREISNETZ_ALLTAG".to_string(),
                    "KREISNETZ_FREIZEIT".to_string()
                ]),
                SqlParameter::Text("OSM".to_string()),
            ]
        );
    }

    #[test]
    fn tier_cascade_renders_case_in_order() {
        let abfrage = KantenAbfrage::alle().mit_stufen(stufen()).to_sql();

        assert!(abfrage.sql.starts_with("SELECT * FROM (SELECT k.id"));
        assert!(abfrage.sql.contains(
            "CASE WHEN k.hoechstgeschwindigkeit_kmh >= $1 AND k.hoechstgeschwindigkeit_kmh <= $2 \
             AND k.dtv_kfz > $3 THEN $4 WHEN k.hoechstgeschwindigkeit_kmh >= $5"
        ));
        assert!(abfrage
            .sql
            .contains("WHEN k.hoechstgeschwindigkeit_kmh >= $9 AND k.dtv_kfz > $10 THEN $11 END"));
        assert!(abfrage.sql.ends_with("WHERE kandidaten.verletzte_stufe IS NOT NULL"));
        assert_eq!(abfrage.parameter.len(), 11);
        assert_eq!(abfrage.parameter[10], SqlParameter::Text("ueber 50".to_string()));
    }

    #[test]
    fn first_matching_tier_wins() {
        let abfrage = KantenAbfrage::alle().mit_stufen(stufen());

        let tempo50 = kante(Hoechstgeschwindigkeit::Max50, Some(6000));
        assert_eq!(
            abfrage.erste_passende_stufe(&tempo50).map(|s| s.bezeichnung.as_str()),
            Some("40 bis 50")
        );
        assert!(abfrage.trifft_zu(&tempo50));

        let ruhig = kante(Hoechstgeschwindigkeit::Max50, Some(4000));
        assert!(!abfrage.trifft_zu(&ruhig));
    }

    #[test]
    fn unknown_traffic_volume_never_matches() {
        let abfrage = KantenAbfrage::alle().mit_stufen(stufen());

        assert!(!abfrage.trifft_zu(&kante(Hoechstgeschwindigkeit::Max70, None)));
        assert!(!abfrage.trifft_zu(&kante(Hoechstgeschwindigkeit::Unbekannt, Some(20_000))));
    }

    #[test]
    fn in_memory_filter_matches_sql_semantics() {
        let abfrage = KantenAbfrage::alle()
            .mit_netzklassen(&Netzklasse::RADNETZ)
            .mit_quelle(QuellSystem::Dlm);
        let mut zeile = kante(Hoechstgeschwindigkeit::Max30, None);

        assert!(abfrage.trifft_zu(&zeile));
        zeile.quelle = QuellSystem::Osm;
        assert!(!abfrage.trifft_zu(&zeile));
        zeile.quelle = QuellSystem::Dlm;
        zeile.attribute.netzklassen = vec![Netzklasse::KommunalnetzAlltag];
        assert!(!abfrage.trifft_zu(&zeile));
    }

    #[test]
    fn one_way_filter_agrees_for_two_sided_edges() {
        let abfrage = KantenAbfrage::alle().nur_einrichtung();
        let sql = abfrage.to_sql();

        assert!(sql.sql.contains(
            "(k.fahrtrichtung_links = ANY($1) AND (NOT k.zweiseitig OR k.fahrtrichtung_rechts = k.fahrtrichtung_links))"
        ));
        assert_eq!(
            sql.parameter,
            vec![SqlParameter::TextListe(vec![
                "IN_RICHTUNG".to_string(),
                "GEGEN_RICHTUNG".to_string()
            ])]
        );

        // (zweiseitig, links, rechts, Ergebnis der SQL-Bedingung)
        let faelle = [
            (true, Richtung::InRichtung, Richtung::GegenRichtung, false),
            (true, Richtung::InRichtung, Richtung::InRichtung, true),
            (true, Richtung::GegenRichtung, Richtung::Unbekannt, false),
            (false, Richtung::GegenRichtung, Richtung::BeideRichtungen, true),
            (false, Richtung::BeideRichtungen, Richtung::InRichtung, false),
        ];
        for (zweiseitig, links, rechts, erwartet) in faelle {
            let mut zeile = kante(Hoechstgeschwindigkeit::Max30, None);
            zeile.attribute.zweiseitig = zweiseitig;
            zeile.attribute.links.fahrtrichtung = links;
            zeile.attribute.rechts.fahrtrichtung = rechts;

            assert_eq!(
                abfrage.trifft_zu(&zeile),
                erwartet,
                "zweiseitig={} links={:?} rechts={:?}",
                zweiseitig,
                links,
                rechts
            );
        }
    }
}
