//! Hierarchical classification schemes.
//!
//! A scheme is a tree of named categories loaded from an indented text file
//! or from a CSV file of `(id, name)` column pairs. Identifiers of the form
//! `key=value`, `key=*` or `key=v1;v2` act as tag filters: an element belongs
//! to the first category, in file order, whose filter matches one of its tags.
//!
//! ```text
//! Leisure #leisure
//!   Parks #leisure=park;garden
//!   Playgrounds #leisure=playground
//! Shops #shop
//!   Food #shop=bakery;butcher
//! ```

use std::collections::BTreeSet;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use geotable_core::{CategoryPath, Classifier, Tags};
use log::{info, warn};
use thiserror::Error;

/// Deepest category level accepted below the top tier.
pub const MAX_LEVELS: usize = 10;

const IDENTIFIER_MARKER: char = '#';
const INDENT: char = ' ';
const SPACES_PER_LEVEL: usize = 2;
const FILTER_VALUE_SEPARATOR: char = ';';
const ANY_VALUE: &str = "*";

/// Errors raised while loading a classification scheme.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// Reading the scheme file failed.
    #[error("failed to read classification scheme {path}")]
    Io {
        /// Scheme path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The CSV scheme could not be parsed.
    #[error("failed to parse classification CSV {path}")]
    Csv {
        /// Scheme path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },
    /// The scheme extension is not recognised.
    #[error("unsupported classification scheme {path}; expected .yml, .yaml, .txt or .csv")]
    UnsupportedFormat {
        /// Scheme path.
        path: Utf8PathBuf,
    },
    /// A line nests deeper than [`MAX_LEVELS`].
    #[error("line {line}: maximum depth of classification is {MAX_LEVELS} levels")]
    TooDeep {
        /// One-based line number.
        line: usize,
    },
    /// A line lacks the `#` marker before its identifier.
    #[error("line {line}: no '#' character found before identifier")]
    MissingSeparator {
        /// One-based line number.
        line: usize,
    },
    /// A category has a name but no identifier.
    #[error("line {line}: no identifier provided for category")]
    MissingIdentifier {
        /// One-based line number.
        line: usize,
    },
    /// A category has neither name nor identifier.
    #[error("line {line}: classification must have both a name and an identifier")]
    MissingName {
        /// One-based line number.
        line: usize,
    },
    /// A line is indented more than one level below its predecessor.
    #[error("line {line}: invalid indentation")]
    InvalidIndentation {
        /// One-based line number.
        line: usize,
    },
    /// The scheme defines no category.
    #[error("classification scheme is empty")]
    Empty,
}

/// Set of tag values accepted by a [`TagFilter`].
#[derive(Clone, Debug, PartialEq, Eq)]
enum FilterValues {
    Any,
    OneOf(BTreeSet<String>),
}

/// Tag condition attached to a category identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFilter {
    key: String,
    values: FilterValues,
}

impl TagFilter {
    /// Parse a category identifier, returning `None` when it is not a tag
    /// filter.
    ///
    /// ```
    /// use geotable_core::Tags;
    /// use geotable_data::TagFilter;
    ///
    /// let filter = TagFilter::parse("amenity=cafe;bar").expect("tag filter");
    /// let tags = Tags::from([("amenity".to_owned(), "bar".to_owned())]);
    /// assert!(filter.matches(&tags));
    /// assert!(TagFilter::parse("1203").is_none());
    /// ```
    #[must_use]
    pub fn parse(identifier: &str) -> Option<Self> {
        let (raw_key, value) = identifier.split_once('=')?;
        let key = raw_key.trim();
        if key.is_empty() {
            return None;
        }
        let values = if value.trim() == ANY_VALUE {
            FilterValues::Any
        } else {
            let accepted: BTreeSet<String> = value
                .split(FILTER_VALUE_SEPARATOR)
                .map(str::trim)
                .filter(|candidate| !candidate.is_empty())
                .map(str::to_owned)
                .collect();
            if accepted.is_empty() {
                return None;
            }
            FilterValues::OneOf(accepted)
        };
        Some(Self {
            key: key.to_owned(),
            values,
        })
    }

    /// Tag key the filter inspects.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether `tags` satisfy the filter.
    #[must_use]
    pub fn matches(&self, tags: &Tags) -> bool {
        tags.get(&self.key).is_some_and(|value| match &self.values {
            FilterValues::Any => true,
            FilterValues::OneOf(accepted) => accepted.contains(value),
        })
    }
}

#[derive(Clone, Debug)]
struct Category {
    id: String,
    name: String,
    parent: Option<usize>,
    filter: Option<TagFilter>,
}

/// Classification hierarchy with tag filters, matched in file order.
#[derive(Clone, Debug, Default)]
pub struct ClassificationScheme {
    categories: Vec<Category>,
    keys: BTreeSet<String>,
}

impl ClassificationScheme {
    /// Load a scheme, choosing the parser from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ClassificationError`] when the file cannot be read or is not
    /// a valid scheme.
    pub fn load(path: &Utf8Path) -> Result<Self, ClassificationError> {
        let extension = path.extension().map(str::to_ascii_lowercase);
        let io_error = |source| ClassificationError::Io {
            path: path.to_path_buf(),
            source,
        };
        let scheme = match extension.as_deref() {
            Some("yml" | "yaml" | "txt") => {
                let mut text = String::new();
                geotable_fs::open_utf8_file(path)
                    .and_then(|mut file| file.read_to_string(&mut text))
                    .map_err(io_error)?;
                Self::parse_indented(&text)?
            }
            Some("csv") => {
                let file = geotable_fs::open_utf8_file(path).map_err(io_error)?;
                Self::parse_csv(file).map_err(|err| match err {
                    ClassificationError::Csv { source, .. } => ClassificationError::Csv {
                        path: path.to_path_buf(),
                        source,
                    },
                    other => other,
                })?
            }
            _ => {
                return Err(ClassificationError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };
        info!(
            "Loaded classification scheme {path} with {} categories",
            scheme.len()
        );
        Ok(scheme)
    }

    /// Parse an indented scheme: one `Name #identifier` per line, two spaces
    /// per level.
    ///
    /// # Errors
    ///
    /// Returns the first structural error with its line number, or
    /// [`ClassificationError::Empty`] when no category is defined.
    pub fn parse_indented(text: &str) -> Result<Self, ClassificationError> {
        let mut scheme = Self::default();
        let mut ancestors: Vec<usize> = Vec::with_capacity(MAX_LEVELS.saturating_add(1));
        for (position, raw) in text.lines().enumerate() {
            let line = position.saturating_add(1);
            if raw.trim().is_empty() {
                continue;
            }
            let spaces = raw.chars().take_while(|&c| c == INDENT).count();
            let level = spaces.checked_div(SPACES_PER_LEVEL).unwrap_or_default();
            if level > MAX_LEVELS {
                return Err(ClassificationError::TooDeep { line });
            }
            let (raw_name, raw_id) = raw
                .trim()
                .split_once(IDENTIFIER_MARKER)
                .ok_or(ClassificationError::MissingSeparator { line })?;
            let name = raw_name.trim();
            let id = raw_id.replace(IDENTIFIER_MARKER, " ").trim().to_owned();
            if level == 0 && id.is_empty() {
                return Err(ClassificationError::MissingIdentifier { line });
            }
            if id.is_empty() {
                return Err(if name.is_empty() {
                    ClassificationError::MissingName { line }
                } else {
                    ClassificationError::MissingIdentifier { line }
                });
            }
            if level > ancestors.len() {
                return Err(ClassificationError::InvalidIndentation { line });
            }
            ancestors.truncate(level);
            let parent = ancestors.last().copied();
            let index = scheme.push(parent, id, name.to_owned());
            ancestors.push(index);
        }
        scheme.validated()
    }

    /// Parse a CSV scheme whose rows list `(id, name)` column pairs from the
    /// top level down, after a header row.
    ///
    /// Pairs with an empty id or name are skipped; repeated categories are
    /// merged.
    ///
    /// # Errors
    ///
    /// Returns [`ClassificationError::Csv`] for unreadable input, or
    /// [`ClassificationError::Empty`] when no category is defined.
    pub fn parse_csv<R: Read>(reader: R) -> Result<Self, ClassificationError> {
        let mut scheme = Self::default();
        let mut rows = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        for result in rows.records() {
            let row = result.map_err(|source| ClassificationError::Csv {
                path: Utf8PathBuf::new(),
                source,
            })?;
            let fields: Vec<&str> = row.iter().collect();
            let mut parent = None;
            for pair in fields.chunks_exact(2) {
                let [id, name] = pair else {
                    continue;
                };
                if id.is_empty() || name.is_empty() {
                    continue;
                }
                let index = scheme
                    .find(parent, id, name)
                    .unwrap_or_else(|| scheme.push(parent, (*id).to_owned(), (*name).to_owned()));
                parent = Some(index);
            }
        }
        scheme.validated()
    }

    /// Number of categories at all levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether the scheme has no category.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn push(&mut self, parent: Option<usize>, id: String, name: String) -> usize {
        let filter = TagFilter::parse(&id);
        if let Some(filter) = &filter {
            self.keys.insert(filter.key().to_owned());
        }
        self.categories.push(Category {
            id,
            name,
            parent,
            filter,
        });
        self.categories.len().saturating_sub(1)
    }

    fn find(&self, parent: Option<usize>, id: &str, name: &str) -> Option<usize> {
        self.categories.iter().position(|category| {
            category.parent == parent && category.id == id && category.name == name
        })
    }

    fn validated(self) -> Result<Self, ClassificationError> {
        if self.categories.is_empty() {
            return Err(ClassificationError::Empty);
        }
        if self.keys.is_empty() {
            warn!("Classification scheme defines no tag filter; no element will be categorized");
        }
        Ok(self)
    }

    fn path_to(&self, index: usize) -> CategoryPath {
        let mut names = Vec::new();
        let mut cursor = Some(index);
        while let Some(category) = cursor.and_then(|position| self.categories.get(position)) {
            names.push(category.name.clone());
            cursor = category.parent;
        }
        names.reverse();
        CategoryPath::new(names)
    }
}

impl Classifier for ClassificationScheme {
    fn lookup(&self, tags: &Tags) -> Option<CategoryPath> {
        self.categories
            .iter()
            .position(|category| {
                category
                    .filter
                    .as_ref()
                    .is_some_and(|filter| filter.matches(tags))
            })
            .map(|index| self.path_to(index))
    }

    fn filter_keys(&self) -> Option<&BTreeSet<String>> {
        Some(&self.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    const SCHEME: &str = "\
Leisure #leisure
  Parks #leisure=park;garden
    Dog parks #leisure=dog_park

  Playgrounds #leisure=playground
Shops #shop
  Food #shop=bakery;butcher
  Other shops #shop=*
";

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        geotable_core::element::collect_tags(pairs.iter().copied())
    }

    #[fixture]
    fn scheme() -> ClassificationScheme {
        ClassificationScheme::parse_indented(SCHEME).expect("valid scheme")
    }

    #[rstest]
    #[case(&[("leisure", "park")], Some("Leisure/Parks"))]
    #[case(&[("leisure", "dog_park")], Some("Leisure/Parks/Dog parks"))]
    #[case(&[("shop", "bakery")], Some("Shops/Food"))]
    #[case(&[("shop", "florist")], Some("Shops/Other shops"))]
    #[case(&[("amenity", "bench")], None)]
    #[case(&[("leisure", "stadium")], None)]
    fn resolves_first_matching_category(
        scheme: ClassificationScheme,
        #[case] pairs: &[(&str, &str)],
        #[case] expected: Option<&str>,
    ) {
        let path = scheme
            .lookup(&tags(pairs))
            .map(|path| path.segments().join("/"));
        assert_eq!(path.as_deref(), expected);
    }

    #[rstest]
    fn exposes_filter_keys(scheme: ClassificationScheme) {
        let keys: Vec<&str> = scheme
            .filter_keys()
            .map(|keys| keys.iter().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(keys, vec!["leisure", "shop"]);
        assert_eq!(scheme.len(), 7);
    }

    #[rstest]
    #[case("Leisure\n", ClassificationError::MissingSeparator { line: 1 })]
    #[case("Leisure #\n", ClassificationError::MissingIdentifier { line: 1 })]
    #[case("Leisure #l\n  Parks #\n", ClassificationError::MissingIdentifier { line: 2 })]
    #[case("Leisure #l\n  #\n", ClassificationError::MissingName { line: 2 })]
    #[case("Leisure #l\n    Parks #p\n", ClassificationError::InvalidIndentation { line: 2 })]
    #[case("  Parks #p\n", ClassificationError::InvalidIndentation { line: 1 })]
    #[case("\n\n", ClassificationError::Empty)]
    fn rejects_malformed_schemes(#[case] text: &str, #[case] expected: ClassificationError) {
        let err = ClassificationScheme::parse_indented(text).expect_err("invalid scheme");
        assert_eq!(err.to_string(), expected.to_string());
    }

    #[rstest]
    fn rejects_schemes_deeper_than_the_limit() {
        let text: String = (0..=MAX_LEVELS.saturating_add(1))
            .map(|level| format!("{}Level {level} #k{level}\n", "  ".repeat(level)))
            .collect();
        let err = ClassificationScheme::parse_indented(&text).expect_err("too deep");
        assert!(matches!(err, ClassificationError::TooDeep { line: 12 }));
    }

    #[rstest]
    fn parses_csv_pairs_and_merges_repeats() {
        let csv = "\
L1_ID,L1_NAME,L2_ID,L2_NAME
shop,Shops,shop=bakery,Bakeries
shop,Shops,shop=butcher,Butchers
amenity,Amenities,,
,Orphan,amenity=cafe,Cafes
";
        let scheme = ClassificationScheme::parse_csv(csv.as_bytes()).expect("valid csv");
        assert_eq!(scheme.len(), 5);
        let path = scheme.lookup(&tags(&[("shop", "butcher")])).expect("match");
        assert_eq!(path.segments(), ["Shops", "Butchers"]);
        let cafe = scheme.lookup(&tags(&[("amenity", "cafe")])).expect("match");
        assert_eq!(cafe.segments(), ["Cafes"]);
    }

    #[rstest]
    fn empty_csv_is_rejected() {
        let err = ClassificationScheme::parse_csv("ID,NAME\n".as_bytes()).expect_err("empty");
        assert!(matches!(err, ClassificationError::Empty));
    }

    #[rstest]
    #[case("key", None)]
    #[case("=value", None)]
    #[case("key=", None)]
    #[case("key=*", Some(("key", true)))]
    #[case("key=a;b", Some(("key", false)))]
    fn parses_tag_filters(#[case] identifier: &str, #[case] expected: Option<(&str, bool)>) {
        let parsed = TagFilter::parse(identifier)
            .map(|filter| (filter.key().to_owned(), filter.values == FilterValues::Any));
        assert_eq!(parsed, expected.map(|(key, any)| (key.to_owned(), any)));
    }
}
