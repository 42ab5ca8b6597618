//! Name based selection of snapshot entities for the `/probe` endpoint.
//!
//! Both patterns are regular expressions that must match the *whole* name:
//! `web.*` selects `web-1` but `web` does not select `web-1`.

use regex::{Regex, RegexBuilder};

use crate::snapshot::Entity;

/// Compiled patterns larger than this are rejected.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid {which} pattern `{pattern}`: {source}")]
    InvalidPattern {
        which: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Selects entities whose name fully matches `include` and does not fully
/// match `exclude`.
///
/// The default filter selects every entity.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl NameFilter {
    /// Compiles a filter.
    ///
    /// A missing or empty `include` behaves like `.*`, a missing or empty
    /// `exclude` excludes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if either pattern does not compile.
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        Ok(Self {
            include: include
                .filter(|p| !p.is_empty())
                .map(|p| compile("include", p))
                .transpose()?,
            exclude: exclude
                .filter(|p| !p.is_empty())
                .map(|p| compile("exclude", p))
                .transpose()?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.include.as_ref().is_none_or(|re| re.is_match(name))
            && !self.exclude.as_ref().is_some_and(|re| re.is_match(name))
    }

    /// Returns the selected entities in their original order.
    pub fn apply<'a, E: Entity>(&self, entities: &'a [E]) -> Vec<&'a E> {
        entities.iter().filter(|e| self.matches(e.name())).collect()
    }
}

fn compile(which: &'static str, pattern: &str) -> Result<Regex> {
    let build = |re: &str| {
        RegexBuilder::new(re)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|source| Error::InvalidPattern {
                which,
                pattern: pattern.to_owned(),
                source,
            })
    };
    // the raw pattern must be valid on its own: `a)|(b` closes the group
    // and escapes the anchors
    build(pattern)?;
    build(&format!("^(?:{pattern})$"))
}
