//! NFe document extraction.
//!
//! Reads the handful of fields the invoice manager stores from an NFe XML document:
//! issuer name and CNPJ from the first `emit` element, invoice number and issue date
//! from the first `ide` element, and the invoice total from the first `ICMSTot`
//! element. Only elements bound to the NFe namespace are considered; everything
//! else in the document is ignored.

use crate::core::invoice::NaturalKey;
use crate::errors::{Error, Result};
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use std::path::Path;
use tracing::{debug, instrument};

/// Namespace every NFe element lives in
pub const NFE_NAMESPACE: &str = "http://www.portalfiscal.inf.br/nfe";

/// The fields read from one NFe document, ready to be ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedInvoice {
    /// Display name of the source file
    pub file_name: String,
    /// `emit/xNome`
    pub issuer_name: String,
    /// `emit/CNPJ`
    pub issuer_tax_id: String,
    /// `ide/nNF`
    pub invoice_number: String,
    /// `ide/dhEmi`
    pub issue_date: String,
    /// `ICMSTot/vNF`
    pub total_value: f64,
}

impl ExtractedInvoice {
    /// The natural key this invoice will be deduplicated by.
    #[must_use]
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(&self.issuer_tax_id, &self.invoice_number, &self.issue_date)
    }
}

/// Returns the final path component used to label a file in the store and in messages.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Reads and extracts an NFe document from disk.
///
/// # Errors
/// Returns `Error::Parse` carrying the file name if the file cannot be read, is not
/// well-formed XML, or lacks one of the expected elements.
#[instrument]
pub fn extract_invoice(path: &Path) -> Result<ExtractedInvoice> {
    let file_name = display_name(path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Parse {
        file: file_name.clone(),
        reason: e.to_string(),
    })?;
    extract_from_str(&file_name, &contents)
}

/// Extracts an NFe document that is already in memory.
///
/// # Errors
/// Returns `Error::Parse` if the document is not well-formed XML or lacks one of the
/// expected elements.
pub fn extract_from_str(file_name: &str, xml: &str) -> Result<ExtractedInvoice> {
    let fields = scan(xml).map_err(|e| Error::Parse {
        file: file_name.to_string(),
        reason: e.to_string(),
    })?;

    let invoice = ExtractedInvoice {
        file_name: file_name.to_string(),
        issuer_name: fields.issuer_name,
        issuer_tax_id: fields.issuer_tax_id,
        invoice_number: fields.invoice_number,
        issue_date: fields.issue_date,
        total_value: fields.total_value,
    };
    debug!("Extracted {} from {}", invoice.key(), file_name);
    Ok(invoice)
}

#[derive(Debug, thiserror::Error)]
enum ScanError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("document ends inside <{0}>")]
    Truncated(String),
    #[error("content found outside the root element")]
    OutsideRoot,
    #[error("missing element {0}")]
    Missing(&'static str),
    #[error("total value {0:?} is not a number")]
    InvalidTotal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Issuer,
    Identification,
    Totals,
}

impl Section {
    fn from_element(local_name: &str) -> Option<Self> {
        match local_name {
            "emit" => Some(Self::Issuer),
            "ide" => Some(Self::Identification),
            "ICMSTot" => Some(Self::Totals),
            _ => None,
        }
    }
}

/// An element currently open while scanning.
struct OpenElement {
    name: String,
    /// Set only on the first occurrence of a section element
    section: Option<Section>,
    /// Text of this element goes into a field
    capturing: bool,
}

#[derive(Default)]
struct Slots {
    issuer_name: Option<String>,
    issuer_tax_id: Option<String>,
    invoice_number: Option<String>,
    issue_date: Option<String>,
    total_value: Option<String>,
    seen_issuer: bool,
    seen_identification: bool,
    seen_totals: bool,
}

impl Slots {
    /// Marks a section as seen, returning whether this was its first occurrence.
    fn first_occurrence(&mut self, section: Section) -> bool {
        let seen = match section {
            Section::Issuer => &mut self.seen_issuer,
            Section::Identification => &mut self.seen_identification,
            Section::Totals => &mut self.seen_totals,
        };
        !std::mem::replace(seen, true)
    }

    fn slot(&mut self, section: Section, child: &str) -> Option<&mut Option<String>> {
        match (section, child) {
            (Section::Issuer, "xNome") => Some(&mut self.issuer_name),
            (Section::Issuer, "CNPJ") => Some(&mut self.issuer_tax_id),
            (Section::Identification, "nNF") => Some(&mut self.invoice_number),
            (Section::Identification, "dhEmi") => Some(&mut self.issue_date),
            (Section::Totals, "vNF") => Some(&mut self.total_value),
            _ => None,
        }
    }

    /// Opens a field if `child` is the first matching child of a first-occurrence section.
    fn open_field(&mut self, parent: Option<Section>, child: &str) -> bool {
        let Some(section) = parent else {
            return false;
        };
        match self.slot(section, child) {
            Some(slot) if slot.is_none() => {
                *slot = Some(String::new());
                true
            }
            _ => false,
        }
    }

    fn append(&mut self, section: Section, child: &str, text: &str) {
        if let Some(Some(value)) = self.slot(section, child) {
            value.push_str(text);
        }
    }
}

struct Fields {
    issuer_name: String,
    issuer_tax_id: String,
    invoice_number: String,
    issue_date: String,
    total_value: f64,
}

fn required(value: Option<String>, element: &'static str) -> std::result::Result<String, ScanError> {
    value.ok_or(ScanError::Missing(element))
}

fn scan(xml: &str) -> std::result::Result<Fields, ScanError> {
    // Text is kept verbatim: padded values are part of the natural key.
    let mut reader = NsReader::from_str(xml);

    let nfe = Namespace(NFE_NAMESPACE.as_bytes());
    let mut open: Vec<OpenElement> = Vec::new();
    let mut slots = Slots::default();
    let mut root_closed = false;

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        let in_nfe = matches!(ns, ResolveResult::Bound(uri) if uri == nfe);

        match event {
            Event::Start(_) | Event::Empty(_) if root_closed => {
                return Err(ScanError::OutsideRoot);
            }
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let parent = open.last().and_then(|p| p.section);
                let capturing = in_nfe && slots.open_field(parent, &name);
                let section = Section::from_element(&name)
                    .filter(|s| in_nfe && slots.first_occurrence(*s));
                open.push(OpenElement {
                    name,
                    section,
                    capturing,
                });
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if in_nfe {
                    let parent = open.last().and_then(|p| p.section);
                    slots.open_field(parent, &name);
                    if let Some(section) = Section::from_element(&name) {
                        slots.first_occurrence(section);
                    }
                }
                if open.is_empty() {
                    root_closed = true;
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                if open.is_empty() {
                    if text.trim().is_empty() {
                        continue;
                    }
                    return Err(ScanError::OutsideRoot);
                }
                capture(&open, &mut slots, &text);
            }
            Event::CData(c) => {
                if open.is_empty() {
                    return Err(ScanError::OutsideRoot);
                }
                let text = String::from_utf8_lossy(&c).into_owned();
                capture(&open, &mut slots, &text);
            }
            Event::End(_) => {
                open.pop();
                if open.is_empty() {
                    root_closed = true;
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(ScanError::Truncated(unclosed.name.clone()));
    }
    if !root_closed {
        return Err(ScanError::NoRoot);
    }

    let raw_total = required(slots.total_value.take(), "ICMSTot/vNF")?;
    let total_value = raw_total
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ScanError::InvalidTotal(raw_total.clone()))?;

    Ok(Fields {
        issuer_name: required(slots.issuer_name.take(), "emit/xNome")?,
        issuer_tax_id: required(slots.issuer_tax_id.take(), "emit/CNPJ")?,
        invoice_number: required(slots.invoice_number.take(), "ide/nNF")?,
        issue_date: required(slots.issue_date.take(), "ide/dhEmi")?,
        total_value,
    })
}

fn capture(open: &[OpenElement], slots: &mut Slots, text: &str) {
    let [.., parent, child] = open else {
        return;
    };
    if let (true, Some(section)) = (child.capturing, parent.section) {
        slots.append(section, &child.name, text);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::{nfe_xml, write_nfe_file};

    #[test]
    fn test_extract_well_formed_document() {
        let xml = nfe_xml("ACME LTDA", "11.111.111/0001-11", "100", "2024-01-10T10:00:00-03:00", "150.00");
        let invoice = extract_from_str("a.xml", &xml).unwrap();

        assert_eq!(invoice.file_name, "a.xml");
        assert_eq!(invoice.issuer_name, "ACME LTDA");
        assert_eq!(invoice.issuer_tax_id, "11.111.111/0001-11");
        assert_eq!(invoice.invoice_number, "100");
        assert_eq!(invoice.issue_date, "2024-01-10T10:00:00-03:00");
        assert_eq!(invoice.total_value, 150.0);
    }

    #[test]
    fn test_extract_unescapes_entities() {
        let xml = nfe_xml("Pão &amp; Cia", "22", "7", "2024-02-01T08:00:00-03:00", "9.90");
        let invoice = extract_from_str("b.xml", &xml).unwrap();
        assert_eq!(invoice.issuer_name, "Pão & Cia");
        assert_eq!(invoice.total_value, 9.9);
    }

    #[test]
    fn test_extract_uses_first_section_occurrence() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
  <NFe><infNFe>
    <ide><nNF>1</nNF><dhEmi>2024-03-05T09:00:00-03:00</dhEmi></ide>
    <emit><CNPJ>33</CNPJ><xNome>First</xNome></emit>
    <emit><CNPJ>44</CNPJ><xNome>Second</xNome></emit>
    <total><ICMSTot><vBC>1.00</vBC><vNF>10.50</vNF></ICMSTot></total>
  </infNFe></NFe>
</nfeProc>"#;
        let invoice = extract_from_str("c.xml", xml).unwrap();
        assert_eq!(invoice.issuer_name, "First");
        assert_eq!(invoice.issuer_tax_id, "33");
        assert_eq!(invoice.total_value, 10.5);
    }

    #[test]
    fn test_extract_ignores_other_namespaces() {
        let xml = r#"<root xmlns="urn:other">
  <emit><CNPJ>1</CNPJ><xNome>X</xNome></emit>
  <ide><nNF>1</nNF><dhEmi>2024-01-01</dhEmi></ide>
  <ICMSTot><vNF>1</vNF></ICMSTot>
</root>"#;
        let result = extract_from_str("other.xml", xml);
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_extract_prefixed_namespace() {
        let xml = r#"<n:NFe xmlns:n="http://www.portalfiscal.inf.br/nfe">
  <n:ide><n:nNF>55</n:nNF><n:dhEmi>2024-04-01T00:00:00-03:00</n:dhEmi></n:ide>
  <n:emit><n:xNome>Prefixed</n:xNome><n:CNPJ>99</n:CNPJ></n:emit>
  <n:ICMSTot><n:vNF>1.25</n:vNF></n:ICMSTot>
</n:NFe>"#;
        let invoice = extract_from_str("p.xml", xml).unwrap();
        assert_eq!(invoice.invoice_number, "55");
        assert_eq!(invoice.issuer_name, "Prefixed");
    }

    #[test]
    fn test_missing_element_names_file_and_element() {
        let xml = r#"<NFe xmlns="http://www.portalfiscal.inf.br/nfe">
  <emit><CNPJ>1</CNPJ></emit>
  <ide><nNF>1</nNF><dhEmi>2024-01-01</dhEmi></ide>
  <ICMSTot><vNF>1</vNF></ICMSTot>
</NFe>"#;
        match extract_from_str("missing.xml", xml) {
            Err(Error::Parse { file, reason }) => {
                assert_eq!(file, "missing.xml");
                assert!(reason.contains("emit/xNome"), "reason was {reason}");
            }
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_field_text_is_kept_verbatim() {
        let xml = nfe_xml("Acme", "11", " 100 ", "2024-01-10T10:00:00-03:00\n", " 150.00 ");
        let invoice = extract_from_str("padded.xml", &xml).unwrap();

        assert_eq!(invoice.invoice_number, " 100 ");
        assert_eq!(invoice.issue_date, "2024-01-10T10:00:00-03:00\n");
        assert_eq!(invoice.total_value, 150.0);
        assert_ne!(invoice.key(), NaturalKey::new("11", "100", "2024-01-10T10:00:00-03:00"));
    }

    #[test]
    fn test_non_numeric_total_is_rejected() {
        let xml = nfe_xml("A", "1", "1", "2024-01-01", "abc");
        let result = extract_from_str("bad-total.xml", &xml);
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        let truncated = "<NFe xmlns=\"http://www.portalfiscal.inf.br/nfe\"><emit><xNome>A</xNome>";
        assert!(extract_from_str("t.xml", truncated).is_err());

        let mismatched = "<NFe><emit></ide></NFe>";
        assert!(extract_from_str("m.xml", mismatched).is_err());

        assert!(extract_from_str("empty.xml", "").is_err());
        assert!(extract_from_str("text.xml", "not xml at all").is_err());
    }

    #[test]
    fn test_extract_invoice_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_nfe_file(dir.path(), "nota.xml", "42", "12.34");

        let invoice = extract_invoice(&path).unwrap();
        assert_eq!(invoice.file_name, "nota.xml");
        assert_eq!(invoice.invoice_number, "42");
        assert_eq!(invoice.total_value, 12.34);
    }

    #[test]
    fn test_extract_invoice_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_invoice(&dir.path().join("ghost.xml"));
        match result {
            Err(Error::Parse { file, .. }) => assert_eq!(file, "ghost.xml"),
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }
}
