use blobver_diff::{ContentEquality, NameComparer};
use blobver_types::PathTemplate;
use serde::{Deserialize, Serialize};

/// Which objects to collapse and how to order and compare them.
///
/// The name comparer must put direct paths in version order: ordinal for
/// timestamp versions, numeric for sequence numbers.
#[derive(Clone, Copy)]
pub struct CollapseRequest<'a> {
    pub container: &'a str,
    pub template: &'a PathTemplate,
    pub name_comparer: &'a dyn NameComparer,
    pub equality: &'a dyn ContentEquality,
}

/// What a collapse examined, kept and removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseReport {
    /// Direct objects found under the template.
    pub examined: usize,
    /// Surviving direct objects, in version order.
    pub retained: Vec<String>,
    /// Deleted (or, in a dry run, deletable) direct objects, in version order.
    pub deleted: Vec<String>,
    pub dry_run: bool,
}
