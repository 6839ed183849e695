//! Single-placeholder path templates.
//!
//! A template such as `reports/{0}.json` names a whole family of objects:
//! substituting a version identifier gives a *direct* path
//! (`reports/2015.01.02.03.04.05.0000000.json`, `reports/7.json`) and
//! substituting [`LATEST_SEGMENT`] gives the *latest* path
//! (`reports/latest.json`).
//!
//! Grammar:
//! - exactly one placeholder, written `{0}`
//! - `{{` and `}}` are escaped literal braces
//! - any other brace is rejected

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::version::VersionId;

/// The value substituted into a template to address the latest object.
pub const LATEST_SEGMENT: &str = "latest";

/// A validated path template with exactly one `{0}` placeholder.
///
/// Construct with [`PathTemplate::parse`]; every other operation in blobver
/// takes a `&PathTemplate`, so an unvalidated template never reaches the store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathTemplate {
    raw: String,
    prefix: String,
    suffix: String,
}

impl PathTemplate {
    /// Validate `template` and split it around its placeholder.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobver_types::PathTemplate;
    ///
    /// assert!(PathTemplate::parse("testpath/{0}.txt").is_ok());
    /// assert!(PathTemplate::parse("testpath/latest.txt").is_err());
    /// assert!(PathTemplate::parse("{0}/{0}.txt").is_err());
    /// assert!(PathTemplate::parse("{1}.txt").is_err());
    /// ```
    pub fn parse(template: &str) -> Result<Self, TypeError> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut placeholders: Vec<String> = Vec::new();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            let out = if placeholders.is_empty() {
                &mut prefix
            } else {
                &mut suffix
            };
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '{' => {
                    let mut index = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) if c.is_ascii_digit() => index.push(c),
                            _ => {
                                return Err(invalid(
                                    template,
                                    "unbalanced '{' (use '{{' for a literal brace)",
                                ))
                            }
                        }
                    }
                    if index.is_empty() {
                        return Err(invalid(template, "empty placeholder '{}'"));
                    }
                    placeholders.push(index);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => {
                    return Err(invalid(
                        template,
                        "unbalanced '}' (use '}}' for a literal brace)",
                    ))
                }
                other => out.push(other),
            }
        }

        match placeholders.as_slice() {
            [index] if index == "0" => Ok(Self {
                raw: template.to_string(),
                prefix,
                suffix,
            }),
            [index] => Err(invalid(
                template,
                &format!("the placeholder should be '{{0}}', not '{{{index}}}'"),
            )),
            found => Err(invalid(
                template,
                &format!(
                    "there should be exactly one placeholder ('{{0}}'), not {}",
                    found.len()
                ),
            )),
        }
    }

    /// The template as originally written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Everything before the placeholder (escapes resolved).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Everything after the placeholder (escapes resolved).
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Substitute an arbitrary value for the placeholder.
    pub fn render(&self, value: &str) -> String {
        let mut path = String::with_capacity(self.prefix.len() + value.len() + self.suffix.len());
        path.push_str(&self.prefix);
        path.push_str(value);
        path.push_str(&self.suffix);
        path
    }

    /// Path of the mutable latest object.
    pub fn render_latest(&self) -> String {
        self.render(LATEST_SEGMENT)
    }

    /// Path of the direct object for `version`.
    pub fn render_direct(&self, version: &VersionId) -> String {
        self.render(&version.render())
    }

    /// Path of the zero-length marker holding the last allocated sequence number.
    pub fn marker_path(&self) -> String {
        self.render_direct(&VersionId::Number(0))
    }

    /// The placeholder value of `path`, if `path` was rendered from this template.
    pub fn extract<'p>(&self, path: &'p str) -> Option<&'p str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        rest.strip_suffix(self.suffix.as_str())
    }

    /// Returns `true` if `path` is this template's latest path.
    pub fn is_latest(&self, path: &str) -> bool {
        self.extract(path) == Some(LATEST_SEGMENT)
    }
}

fn invalid(template: &str, reason: &str) -> TypeError {
    TypeError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for PathTemplate {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PathTemplate {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathTemplate> for String {
    fn from(template: PathTemplate) -> Self {
        template.raw
    }
}

impl fmt::Debug for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathTemplate({})", self.raw)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
