//! Fallback-chain parsing.
//!
//! An expression such as `"nickname => username => _displayName"` becomes an ordered
//! chain of candidates. Parsing never validates candidates against a document; that is
//! deferred to the [`FieldResolver`](crate::resolver::FieldResolver) so configuration
//! errors surface with the offending document's model attached.

use crate::config::{ChainSyntax, ViewsConfig};
use smallvec::SmallVec;

/// One candidate source of a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    name: String,
    accessor_name: Option<String>,
}

impl Candidate {
    /// Candidate as written in the expression, e.g. `_displayName` or `profile.city`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accessor name (`displayName` for `_displayName`) when the candidate carries the
    /// accessor marker.
    ///
    /// A marked candidate is still read as a stored attribute if the document's schema
    /// declares an attribute with the full name.
    #[must_use]
    pub fn accessor_name(&self) -> Option<&str> {
        self.accessor_name.as_deref()
    }
}

/// Ordered candidates for one output field.
///
/// Most chains hold one to three candidates, so they are stored inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackChain {
    candidates: SmallVec<[Candidate; 4]>,
}

impl FallbackChain {
    /// Candidates in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// An empty chain always resolves to absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Parser for fallback-chain expressions.
///
/// # Example
///
/// ```
/// use docview_core::chain::ChainParser;
/// use docview_core::config::ChainSyntax;
///
/// let parser = ChainParser::new(ChainSyntax::default());
/// let chain = parser.parse(Some(" nickname =>username=> _displayName "));
///
/// let names: Vec<_> = chain.iter().map(|c| c.name()).collect();
/// assert_eq!(names, ["nickname", "username", "_displayName"]);
/// assert!(parser.parse(None).is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ChainParser {
    syntax: ChainSyntax,
}

impl ChainParser {
    /// Create a parser for the given syntax.
    #[must_use]
    pub const fn new(syntax: ChainSyntax) -> Self {
        Self { syntax }
    }

    /// Create a parser using the syntax section of a configuration.
    #[must_use]
    pub fn from_config(config: &ViewsConfig) -> Self {
        Self::new(config.syntax().clone())
    }

    /// Parse an expression into a chain.
    ///
    /// Absent or blank expressions yield an empty chain. Blank candidates between
    /// separators are dropped.
    #[must_use]
    pub fn parse(&self, expression: Option<&str>) -> FallbackChain {
        let Some(expression) = expression else {
            return FallbackChain::default();
        };

        let candidates = expression
            .split(self.syntax.separator.as_str())
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .map(|candidate| Candidate {
                name: candidate.to_string(),
                accessor_name: candidate
                    .strip_prefix(self.syntax.accessor_marker)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string),
            })
            .collect();

        FallbackChain { candidates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parser() -> ChainParser {
        ChainParser::new(ChainSyntax::default())
    }

    #[test]
    fn test_accessor_marker_detection() {
        let chain = parser().parse(Some("username => _fullName => _"));
        let candidates: Vec<_> = chain.iter().collect();

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].accessor_name(), None);
        assert_eq!(candidates[1].accessor_name(), Some("fullName"));
        // A lone marker names nothing
        assert_eq!(candidates[2].accessor_name(), None);
    }

    #[test]
    fn test_blank_expression_is_empty() {
        assert!(parser().parse(Some("")).is_empty());
        assert!(parser().parse(Some("   ")).is_empty());
        assert_eq!(parser().parse(Some("a => => b =>")).len(), 2);
    }

    #[test]
    fn test_custom_syntax() {
        let parser = ChainParser::new(ChainSyntax {
            separator: "|".to_string(),
            accessor_marker: '$',
        });
        let chain = parser.parse(Some("name | $computed | _raw"));
        let accessors: Vec<_> = chain.iter().map(Candidate::accessor_name).collect();
        assert_eq!(accessors, [None, Some("computed"), None]);
    }

    proptest! {
        #[test]
        fn prop_parse_preserves_order(names in prop::collection::vec("[a-zA-Z_][a-zA-Z0-9_.]{0,12}", 0..8)) {
            let expression = names.join(" => ");
            let chain = parser().parse(Some(&expression));
            let parsed: Vec<_> = chain.iter().map(|c| c.name().to_string()).collect();
            prop_assert_eq!(parsed, names);
        }

        #[test]
        fn prop_whitespace_is_insignificant(names in prop::collection::vec("[a-z]{1,8}", 1..6), pad in " {0,3}") {
            let tight = names.join("=>");
            let loose = names.join(&format!("{pad}=>{pad}"));
            prop_assert_eq!(parser().parse(Some(&tight)), parser().parse(Some(&loose)));
        }
    }
}
