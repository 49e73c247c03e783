//! Typed strategy specs.
//!
//! Every configurable "how do I find X on the page" decision is a closed enum,
//! resolved once when the job configuration is deserialized. Unknown variants
//! fail deserialization instead of falling through to a default branch.
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder substituted by page numbers and field values in templates.
pub const PLACEHOLDER: &str = "#p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorKind {
    Id,
    Css,
    XPath,
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorKind::Id => write!(f, "id"),
            LocatorKind::Css => write!(f, "css"),
            LocatorKind::XPath => write!(f, "xpath"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorKind,
    pub value: String,
}

impl Locator {
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Id, value)
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Css, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::XPath, value)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

/// A compiled regular expression used to pull a value out of raw text.
///
/// Serialized as its source string; compiled on deserialization so a broken
/// pattern is reported at configuration-load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExtractionPattern(Regex);

impl ExtractionPattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }
}

impl TryFrom<String> for ExtractionPattern {
    type Error = regex::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ExtractionPattern> for String {
    fn from(value: ExtractionPattern) -> Self {
        value.0.as_str().to_string()
    }
}

impl PartialEq for ExtractionPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ExtractionPattern {}

/// How to obtain a page number (total page count or current page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageNumberSpec {
    Literal(u32),
    TextAt {
        locator: Locator,
        #[serde(default)]
        pattern: Option<ExtractionPattern>,
    },
    AttributeAt {
        locator: Locator,
        attribute: String,
    },
    FromUrl {
        pattern: ExtractionPattern,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationSpec {
    /// Template containing `#p`, e.g. `https://example.com/list?page=#p`.
    RewriteUrl { template: String },
    /// A page-context function called with the page number.
    InvokeNamedFunction { name: String },
    /// Type the page number into an input, then submit or click `confirm`.
    FillAndSubmit {
        input: Locator,
        #[serde(default)]
        confirm: Option<Locator>,
    },
}

/// Convergence predicate replacing the plain current-page re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCheck {
    pub locator: Locator,
    pub expect_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListLocatorSpec {
    pub locator: Locator,
    #[serde(default)]
    pub skip_rows: usize,
    #[serde(default)]
    pub merge_group: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemIdSpec {
    SelfText,
    ChildLocator {
        locator: Locator,
        #[serde(default)]
        pattern: Option<ExtractionPattern>,
        #[serde(default)]
        prefix_with_index: bool,
    },
    PageNumber,
    ExternalHook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDataSpec {
    pub locator: Locator,
    #[serde(default)]
    pub extra: Option<ExtraContentSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraContentSpec {
    pub source: ExtraSource,
    /// Keep only the id before appending the extra content.
    #[serde(default)]
    pub replace_fields: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtraSource {
    RemoteFetch {
        url_template: String,
        /// Field indices substituted, in order, for each `#p` in the template.
        params: Vec<usize>,
        /// CSS selector applied to the downloaded markup.
        #[serde(default)]
        markup_rule: Option<String>,
    },
    InPageReveal {
        trigger: RevealTrigger,
        #[serde(default)]
        opens_new_tab: bool,
        result: RevealResult,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealTrigger {
    SelfItem,
    Child(Locator),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealResult {
    Hook,
    Elements {
        locator: Locator,
        #[serde(default)]
        attribute: Option<String>,
    },
}

impl ExtraContentSpec {
    /// Whether collecting this content navigates the listing tab away.
    pub fn invalidates_list(&self) -> bool {
        matches!(
            self.source,
            ExtraSource::InPageReveal {
                opens_new_tab: false,
                ..
            }
        )
    }
}
