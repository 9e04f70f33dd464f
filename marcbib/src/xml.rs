//! Streaming reader for MARCXML collections.
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::path::Path;
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

use super::BibRecord;
use super::ControlField;
use super::DataField;

pub const MARCXML_NAMESPACE: &str = "http://www.loc.gov/MARC21/slim";

/// Which element's character data we are currently collecting.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TextTarget {
    None,
    Leader,
    ControlField,
    Subfield,
}

struct ParseState {
    record: BibRecord,
    target: TextTarget,
    record_complete: bool,
    doc_complete: bool,
}

/// Iterator over the records of a MARCXML document.
///
/// Records are parsed one at a time; a fully parsed record is released
/// to the caller before the next one is read, so memory use is bounded
/// by the largest single record regardless of document size.
pub enum RecordStream {
    FileReader(EventReader<BufReader<File>>),
    ByteReader(EventReader<Cursor<Vec<u8>>>),
}

impl Iterator for RecordStream {
    type Item = Result<BibRecord, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut state = ParseState {
            record: BibRecord::new(),
            target: TextTarget::None,
            record_complete: false,
            doc_complete: false,
        };

        self.read_next(&mut state).transpose()
    }
}

impl RecordStream {
    /// Create a stream over a MARCXML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        match File::open(path) {
            Ok(file) => Ok(RecordStream::FileReader(EventReader::new(BufReader::new(
                file,
            )))),
            Err(e) => Err(format!("Cannot read MARCXML file: {} {e}", path.display())),
        }
    }

    /// Create a stream over an in-memory MARCXML string.
    pub fn from_string(xml: &str) -> Self {
        RecordStream::ByteReader(EventReader::new(Cursor::new(xml.as_bytes().to_vec())))
    }

    /// Pull the next record from the data source.
    fn read_next(&mut self, state: &mut ParseState) -> Result<Option<BibRecord>, String> {
        loop {
            let evt = match *self {
                RecordStream::FileReader(ref mut reader) => reader.next(),
                RecordStream::ByteReader(ref mut reader) => reader.next(),
            }
            .map_err(|e| format!("Error processing XML: {e}"))?;

            self.handle_event(state, evt)?;

            if state.record_complete {
                // Hand the compiled record to the caller and start fresh.
                return Ok(Some(std::mem::take(&mut state.record)));
            } else if state.doc_complete {
                // Discard any partial record in progress.
                state.record = BibRecord::new();
                return Ok(None);
            }
        }
    }

    /// Process a single XML read event.
    fn handle_event(&mut self, state: &mut ParseState, evt: XmlEvent) -> Result<(), String> {
        match evt {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                self.handle_start_element(state, name.local_name.as_str(), &attributes)?;
            }

            XmlEvent::Characters(ref text) => {
                let record = &mut state.record;
                match state.target {
                    TextTarget::Leader => record.set_leader(text.as_str()),
                    TextTarget::ControlField => {
                        if let Some(cf) = record.control_fields_mut().last_mut() {
                            cf.set_content(text.as_str());
                        }
                    }
                    TextTarget::Subfield => {
                        if let Some(field) = record.data_fields_mut().last_mut() {
                            if let Some(sf) = field.subfields_mut().last_mut() {
                                sf.set_content(text.as_str());
                            }
                        }
                    }
                    TextTarget::None => {}
                }
                state.target = TextTarget::None;
            }

            XmlEvent::EndElement { name, .. } => {
                if name.local_name.as_str() == "record" {
                    state.record_complete = true;
                }
            }

            XmlEvent::EndDocument => {
                state.doc_complete = true;
            }

            _ => {}
        }

        Ok(())
    }

    fn handle_start_element(
        &mut self,
        state: &mut ParseState,
        name: &str,
        attributes: &[OwnedAttribute],
    ) -> Result<(), String> {
        let record = &mut state.record;

        let tag_of = |attrs: &[OwnedAttribute]| -> Option<String> {
            attrs
                .iter()
                .find(|a| a.name.local_name == "tag")
                .map(|a| a.value.clone())
        };

        match name {
            "leader" => state.target = TextTarget::Leader,

            "controlfield" => match tag_of(attributes) {
                Some(tag) => {
                    record
                        .control_fields_mut()
                        .push(ControlField::new(tag, "")?);
                    state.target = TextTarget::ControlField;
                }
                None => return Err("controlfield has no tag".to_string()),
            },

            "datafield" => match tag_of(attributes) {
                Some(tag) => record.data_fields_mut().push(DataField::new(tag)?),
                None => return Err("datafield has no tag".to_string()),
            },

            "subfield" => {
                let field = record
                    .data_fields_mut()
                    .last_mut()
                    .ok_or_else(|| "Encountered <subfield/> without a field".to_string())?;

                if let Some(code) = attributes
                    .iter()
                    .find(|a| a.name.local_name == "code")
                    .map(|a| a.value.as_str())
                {
                    field.add_subfield(code, "")?;
                    state.target = TextTarget::Subfield;
                }
            }
            _ => {}
        }

        Ok(())
    }
}

impl BibRecord {
    /// Returns an iterator over the MARCXML file which emits records.
    pub fn from_xml_file(path: &Path) -> Result<RecordStream, String> {
        RecordStream::from_file(path)
    }

    /// Returns an iterator over the MARCXML string which emits records.
    ///
    /// Handles documents with or without the MARC21 slim namespace and
    /// with or without a `collection` wrapper element.
    ///
    /// # Examples
    ///
    /// ```
    /// use marcbib::BibRecord;
    ///
    /// let stream = BibRecord::from_xml(r#"<collection>
    ///   <record><datafield tag="245" ind1="1" ind2="0"><subfield code="a">First title</subfield></datafield></record>
    ///   <record xmlns="http://www.loc.gov/MARC21/slim"><datafield tag="245" ind1="1" ind2="0"><subfield code="a">Second title</subfield></datafield></record>
    /// </collection>"#);
    ///
    /// let titles: Vec<String> = stream
    ///     .map(|rec| rec.unwrap().first_value("245", "a").unwrap().to_string())
    ///     .collect();
    /// assert_eq!(titles, ["First title", "Second title"]);
    /// ```
    pub fn from_xml(xml: &str) -> RecordStream {
        RecordStream::from_string(xml)
    }
}
