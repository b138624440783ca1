//! Address autocomplete formatting
//!
//! Pure mapping from one address record's optional sub-fields to a single
//! display string. The grammar is an ordered list of segments, each carrying
//! its own trailing separator, folded left-to-right; a segment whose source
//! fields are all null contributes nothing, so absent parts never shift a
//! later segment or double a separator. The street-type comma is the one
//! fixed separator emitted even when the field is absent, which is why a
//! record with no street type reads `"MAIN , PERTH WA 6000"`.
//!
//! All values are opaque text tokens; nothing is parsed numerically.

/// The sub-fields of one address record consumed by the formatter
///
/// Every field may independently be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub building_name: Option<String>,
    pub flat_type: Option<String>,
    pub flat_number_prefix: Option<String>,
    pub flat_number: Option<String>,
    pub flat_number_suffix: Option<String>,
    pub number_first: Option<String>,
    pub number_first_suffix: Option<String>,
    pub number_last: Option<String>,
    pub number_last_suffix: Option<String>,
    pub street_name: Option<String>,
    pub street_type: Option<String>,
    pub locality_name: Option<String>,
    pub state_abbreviation: Option<String>,
    pub postcode: Option<String>,
}

/// One grammar rule: a value and the separator that follows it
struct Segment {
    text: String,
    trailing: &'static str,
    /// Emit the trailing separator even when the value is absent
    fixed: bool,
}

impl Segment {
    fn new(text: String, trailing: &'static str) -> Self {
        Self {
            text,
            trailing,
            fixed: false,
        }
    }

    fn with_fixed_separator(text: String, trailing: &'static str) -> Self {
        Self {
            text,
            trailing,
            fixed: true,
        }
    }
}

/// Concatenate present values with no separator
fn cat(fields: &[&Option<String>]) -> String {
    fields
        .iter()
        .filter_map(|f| f.as_deref())
        .collect::<Vec<_>>()
        .concat()
}

fn segments(parts: &AddressParts) -> [Segment; 9] {
    let first = cat(&[&parts.number_first, &parts.number_first_suffix]);
    let last = cat(&[&parts.number_last, &parts.number_last_suffix]);
    let number_range = if last.is_empty() {
        first
    } else {
        format!("{}-{}", first, last)
    };

    [
        Segment::new(cat(&[&parts.building_name]), ", "),
        Segment::new(cat(&[&parts.flat_type]), " "),
        Segment::new(
            cat(&[
                &parts.flat_number_prefix,
                &parts.flat_number,
                &parts.flat_number_suffix,
            ]),
            ", ",
        ),
        Segment::new(number_range, " "),
        Segment::new(cat(&[&parts.street_name]), " "),
        Segment::with_fixed_separator(cat(&[&parts.street_type]), ", "),
        Segment::new(cat(&[&parts.locality_name]), " "),
        Segment::new(cat(&[&parts.state_abbreviation]), " "),
        Segment::new(cat(&[&parts.postcode]), ""),
    ]
}

/// Format one record's autocomplete string
pub fn autocomplete(parts: &AddressParts) -> String {
    segments(parts)
        .iter()
        .fold(String::new(), |mut out, segment| {
            if !segment.text.is_empty() {
                out.push_str(&segment.text);
                out.push_str(segment.trailing);
            } else if segment.fixed {
                out.push_str(segment.trailing);
            }
            out
        })
}
