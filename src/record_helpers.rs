//! Record-type predicates and common bibliographic lookups.
//!
//! The [`RecordHelpers`] trait bundles the questions pipeline tools ask of
//! nearly every record: what kind of record is it, what is its title, and
//! which superior work does it belong to.
//!
//! # Examples
//!
//! ```
//! use marcio::{Leader, Record, RecordHelpers};
//!
//! let mut leader = Leader::default();
//! leader.bibliographic_level = 'a';
//! let record = Record::builder(leader)
//!     .control_field("001", "987")
//!     .data_field("245", '1', '0', [('a', "Article"), ('b', "a subtitle")])
//!     .data_field("773", '1', '8', [('w', "(DE-627)123456"), ('t', "Journal")])
//!     .build()?;
//!
//! assert!(record.is_article());
//! assert_eq!(record.main_title().as_deref(), Some("Article : a subtitle"));
//! assert_eq!(record.superior_control_number(), Some("123456"));
//! # Ok::<(), marcio::MarcError>(())
//! ```

use crate::leader::{BibliographicLevel, RecordType};
use crate::record::Record;

/// Phrases in `245 $h` that mark an electronic resource.
const ELECTRONIC_MEDIUM_MARKERS: &[&str] = &["electronic resource", "elektronische ressource"];

/// Genre term in `655 $a` marking a review.
const REVIEW_GENRE: &str = "Rezension";

/// Helper queries for [`Record`].
pub trait RecordHelpers {
    /// Record type from leader/06.
    #[must_use]
    fn record_type(&self) -> RecordType;

    /// Bibliographic level from leader/07.
    #[must_use]
    fn bibliographic_level(&self) -> BibliographicLevel;

    /// Leader/07 is `m`.
    #[must_use]
    fn is_monograph(&self) -> bool {
        self.bibliographic_level() == BibliographicLevel::Monograph
    }

    /// Leader/07 is `s`.
    #[must_use]
    fn is_serial(&self) -> bool {
        self.bibliographic_level() == BibliographicLevel::Serial
    }

    /// Leader/07 marks a component part (`a` or `b`).
    #[must_use]
    fn is_article(&self) -> bool {
        self.bibliographic_level().is_component_part()
    }

    /// Whether the record describes an electronic resource.
    ///
    /// True for leader/06 `m` (computer file), for a monograph whose `007`
    /// starts with `c`, and for a `245 $h` naming an electronic resource.
    #[must_use]
    fn is_electronic_resource(&self) -> bool;

    /// Whether a `655 $a` classifies the record as a review.
    #[must_use]
    fn is_review_article(&self) -> bool;

    /// `245 $a`, followed by `" : "` and `245 $b` when present.
    #[must_use]
    fn main_title(&self) -> Option<String>;

    /// Control number of the superior work from `773 $w`, without any
    /// parenthesised source prefix such as `(DE-627)`.
    #[must_use]
    fn superior_control_number(&self) -> Option<&str>;

    /// Title of the superior work from `773 $t`.
    #[must_use]
    fn superior_title(&self) -> Option<&str>;
}

impl RecordHelpers for Record {
    fn record_type(&self) -> RecordType {
        self.leader().record_type_kind()
    }

    fn bibliographic_level(&self) -> BibliographicLevel {
        self.leader().bibliographic_level_kind()
    }

    fn is_electronic_resource(&self) -> bool {
        if self.leader().record_type == 'm' {
            return true;
        }
        if self.is_monograph()
            && self
                .get_tag_range("007")
                .filter_map(|f| f.control_value())
                .any(|v| v.starts_with('c'))
        {
            return true;
        }
        self.get_first_field("245")
            .and_then(|f| f.subfields())
            .is_some_and(|sf| {
                sf.values_for_code('h').any(|medium| {
                    let medium = medium.to_lowercase();
                    ELECTRONIC_MEDIUM_MARKERS.iter().any(|m| medium.contains(m))
                })
            })
    }

    fn is_review_article(&self) -> bool {
        self.get_tag_range("655")
            .filter_map(|f| f.subfields())
            .any(|sf| sf.has_subfield_with_value('a', REVIEW_GENRE))
    }

    fn main_title(&self) -> Option<String> {
        let title = self.get_first_subfield_value("245", 'a')?;
        match self.get_first_subfield_value("245", 'b') {
            Some(rest) => Some(format!("{title} : {rest}")),
            None => Some(title.to_string()),
        }
    }

    fn superior_control_number(&self) -> Option<&str> {
        let value = self.get_first_subfield_value("773", 'w')?;
        let stripped = match value.strip_prefix('(') {
            Some(rest) => rest.split_once(')').map_or(value, |(_, id)| id),
            None => value,
        };
        Some(stripped.trim()).filter(|id| !id.is_empty())
    }

    fn superior_title(&self) -> Option<&str> {
        self.get_first_subfield_value("773", 't')
    }
}
