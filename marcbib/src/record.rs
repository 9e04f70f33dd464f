//! Base MARC bibliographic record model.

const TAG_SIZE: usize = 3;
const CODE_SIZE: usize = 1;

/// Verifies the provided string is composed of 'len' number of bytes.
fn check_byte_count(s: &str, len: usize) -> Result<(), String> {
    let byte_len = s.len();
    if byte_len != len {
        return Err(format!(
            "Invalid byte count for string s={s} wanted={len} found={byte_len}"
        ));
    }
    Ok(())
}

/// MARC control field whose tag value is < "010".
#[derive(Debug, Clone, PartialEq)]
pub struct ControlField {
    tag: String,
    content: String,
}

impl ControlField {
    /// Create a ControlField with the provided tag and content.
    ///
    /// * `tag` - Must be a 3-byte tag in the control field range.
    ///
    /// # Examples
    ///
    /// ```
    /// let cf = marcbib::ControlField::new("008", "760629").unwrap();
    /// assert_eq!(cf.tag(), "008");
    /// ```
    /// ```
    /// assert!(marcbib::ControlField::new("010", "76012345").is_err());
    /// ```
    pub fn new(tag: impl Into<String>, content: impl Into<String>) -> Result<Self, String> {
        let tag = tag.into();
        check_byte_count(&tag, TAG_SIZE)?;

        if tag.as_str() < "000" || tag.as_str() > "009" {
            return Err(format!("Invalid control field tag: {tag}"));
        }

        Ok(ControlField {
            tag,
            content: content.into(),
        })
    }

    /// Get the tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Get the content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Set the content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }
}

/// A single subfield code + value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Subfield {
    code: String,
    content: String,
}

impl Subfield {
    /// Create a Subfield with the provided code and content.
    ///
    /// * `code` - Must be a single byte.
    ///
    /// # Examples
    ///
    /// ```
    /// let sf = marcbib::Subfield::new("a", "The great Gatsby").unwrap();
    /// assert_eq!(sf.code(), "a");
    /// assert_eq!(sf.content(), "The great Gatsby");
    /// ```
    pub fn new(code: impl Into<String>, content: impl Into<String>) -> Result<Self, String> {
        let code = code.into();
        check_byte_count(&code, CODE_SIZE)?;
        Ok(Subfield {
            code,
            content: content.into(),
        })
    }

    /// Get the code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Set the content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }
}

/// A MARC data field with tag and subfields.
///
/// Indicators are not modeled; none of the fields this crate's
/// consumers read are indicator-sensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    tag: String,
    subfields: Vec<Subfield>,
}

impl DataField {
    /// Create a DataField with the provided tag.
    ///
    /// * `tag` - Must be a 3-byte tag in the data field range.
    ///
    /// # Examples
    ///
    /// ```
    /// let field = marcbib::DataField::new("245").unwrap();
    /// assert_eq!(field.tag(), "245");
    /// assert!(field.subfields().is_empty());
    /// ```
    pub fn new(tag: impl Into<String>) -> Result<Self, String> {
        let tag = tag.into();
        check_byte_count(&tag, TAG_SIZE)?;

        if tag.as_str() < "010" || tag.as_str() > "999" {
            // Some vendors emit nonstandard tags (e.g. OCLC "DAT").
            // Only the byte count matters for parsing.
            log::warn!("Unexpected tag for data field: '{tag}'");
        }

        Ok(DataField {
            tag,
            subfields: Vec::new(),
        })
    }

    /// Get the tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Get the full list of subfields.
    pub fn subfields(&self) -> &Vec<Subfield> {
        &self.subfields
    }

    /// Get a mutable list of subfields.
    pub fn subfields_mut(&mut self) -> &mut Vec<Subfield> {
        &mut self.subfields
    }

    /// Get the content of the first subfield with the provided code.
    ///
    /// # Examples
    ///
    /// ```
    /// let mut field = marcbib::DataField::new("260").unwrap();
    /// field.add_subfield("b", "Scribner,").unwrap();
    /// assert_eq!(field.first_value("b"), Some("Scribner,"));
    /// assert_eq!(field.first_value("c"), None);
    /// ```
    pub fn first_value(&self, code: &str) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code() == code)
            .map(|sf| sf.content())
    }

    /// Collect the contents of every subfield whose code appears in
    /// `codes`, preserving the source order of the subfields.
    ///
    /// # Examples
    ///
    /// ```
    /// let mut field = marcbib::DataField::new("245").unwrap();
    /// field.add_subfield("a", "Annual report").unwrap();
    /// field.add_subfield("c", "by the Board.").unwrap();
    /// field.add_subfield("n", "Part 2").unwrap();
    /// let vals = field.values_in_order(&["a", "b", "n", "p"]);
    /// assert_eq!(vals, vec!["Annual report", "Part 2"]);
    /// ```
    pub fn values_in_order(&self, codes: &[&str]) -> Vec<&str> {
        self.subfields
            .iter()
            .filter(|sf| codes.contains(&sf.code()))
            .map(|sf| sf.content())
            .collect()
    }

    /// Append a subfield built from the provided code and content.
    pub fn add_subfield(
        &mut self,
        code: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), String> {
        self.subfields.push(Subfield::new(code, content)?);
        Ok(())
    }
}

/// A MARC bibliographic record: leader, control fields, and data fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BibRecord {
    leader: Option<String>,
    control_fields: Vec<ControlField>,
    data_fields: Vec<DataField>,
}

impl BibRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        BibRecord::default()
    }

    /// Get the leader, if one was present in the source.
    pub fn leader(&self) -> Option<&str> {
        self.leader.as_deref()
    }

    /// Apply a leader value.
    ///
    /// The leader is stored verbatim; this crate's consumers never
    /// interpret its positional data.
    pub fn set_leader(&mut self, leader: impl Into<String>) {
        self.leader = Some(leader.into());
    }

    /// Get the full list of control fields.
    pub fn control_fields(&self) -> &Vec<ControlField> {
        &self.control_fields
    }

    /// Get a mutable list of control fields.
    pub fn control_fields_mut(&mut self) -> &mut Vec<ControlField> {
        &mut self.control_fields
    }

    /// Get the full list of data fields.
    pub fn data_fields(&self) -> &Vec<DataField> {
        &self.data_fields
    }

    /// Get a mutable list of data fields.
    pub fn data_fields_mut(&mut self) -> &mut Vec<DataField> {
        &mut self.data_fields
    }

    /// Get the content of the first control field with the provided tag.
    ///
    /// # Examples
    ///
    /// ```
    /// let mut rec = marcbib::BibRecord::new();
    /// rec.control_fields_mut()
    ///     .push(marcbib::ControlField::new("001", "ocm12345").unwrap());
    /// assert_eq!(rec.control_field("001"), Some("ocm12345"));
    /// assert_eq!(rec.control_field("008"), None);
    /// ```
    pub fn control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields
            .iter()
            .find(|cf| cf.tag() == tag)
            .map(|cf| cf.content())
    }

    /// Get the first data field with the provided tag.
    pub fn first_field(&self, tag: &str) -> Option<&DataField> {
        self.data_fields.iter().find(|f| f.tag() == tag)
    }

    /// Get all data fields with the provided tag.
    pub fn fields(&self, tag: &str) -> Vec<&DataField> {
        self.data_fields.iter().filter(|f| f.tag() == tag).collect()
    }

    /// Get the content of the named subfield of the first field with
    /// the provided tag.
    ///
    /// # Examples
    ///
    /// ```
    /// let mut rec = marcbib::BibRecord::new();
    /// let mut field = marcbib::DataField::new("010").unwrap();
    /// field.add_subfield("a", "   68004538 ").unwrap();
    /// rec.data_fields_mut().push(field);
    /// assert_eq!(rec.first_value("010", "a"), Some("   68004538 "));
    /// ```
    pub fn first_value(&self, tag: &str, code: &str) -> Option<&str> {
        self.first_field(tag).and_then(|f| f.first_value(code))
    }
}
