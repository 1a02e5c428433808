//! CSV-Export: UTF-8 mit BOM, Semikolon, jedes Feld in Anführungszeichen.

use ::csv::{QuoteStyle, Terminator, WriterBuilder};

use super::{ensure_utm32, ExportConverter, ExportData, ExportError, ExportFormat};

/// Byte Order Mark für Excel-kompatibles UTF-8
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Platzhaltertext bei leerem Export
pub const KEINE_DATEN: &str = "Es sind keine Daten zum Export vorhanden.";

/// Schreibt Attributtabellen als CSV; die Geometrie wird nicht exportiert.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExportConverter;

impl ExportConverter for CsvExportConverter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn convert(&self, data: &[ExportData]) -> Result<Vec<u8>, ExportError> {
        let mut out = UTF8_BOM.to_vec();

        let Some(first) = data.first() else {
            out.extend_from_slice(KEINE_DATEN.as_bytes());
            return Ok(out);
        };
        ensure_utm32(data)?;

        let headers = first.headers();
        let mut writer = WriterBuilder::new()
            .delimiter(b';')
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(out);

        writer.write_record(&headers)?;
        for record in data {
            let properties = record.properties();
            writer.write_record(
                headers
                    .iter()
                    .map(|h| properties.get(h).map(String::as_str).unwrap_or("")),
            )?;
        }

        writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Geometry, SRID_UTM32};
    use geo_types::point;
    use indexmap::IndexMap;

    fn record(properties: &[(&str, &str)]) -> ExportData {
        ExportData::new(
            Geometry::new(SRID_UTM32, point!(x: 0.0, y: 0.0)),
            properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn without_bom(bytes: &[u8]) -> String {
        assert!(bytes.starts_with(UTF8_BOM), "BOM erwartet");
        String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).expect("UTF-8 erwartet")
    }

    #[test]
    fn empty_input_yields_message() {
        let bytes = CsvExportConverter.convert(&[]).expect("Export erwartet");

        assert_eq!(without_bom(&bytes), KEINE_DATEN);
    }

    #[test]
    fn missing_values_are_empty_and_quotes_are_escaped() {
        let data = vec![
            record(&[("a", "1"), ("b", "say \"hi\"")]),
            record(&[("b", "x;y")]),
        ];
        let bytes = CsvExportConverter.convert(&data).expect("Export erwartet");

        assert_eq!(
            without_bom(&bytes),
            "\"a\";\"b\"\n\"1\";\"say \"\"hi\"\"\"\n\"\";\"x;y\"\n"
        );
    }

    #[test]
    fn declared_headers_define_column_order() {
        let data = vec![ExportData::with_headers(
            Geometry::new(SRID_UTM32, point!(x: 0.0, y: 0.0)),
            IndexMap::from([
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ]),
            vec!["b".to_string(), "a".to_string()],
        )];
        let bytes = CsvExportConverter.convert(&data).expect("Export erwartet");

        assert_eq!(without_bom(&bytes), "\"b\";\"a\"\n\"2\";\"1\"\n");
    }
}
