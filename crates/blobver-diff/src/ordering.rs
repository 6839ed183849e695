//! Version ordering of direct object paths.

use std::cmp::Ordering;

use blobver_types::PathTemplate;

/// Orders direct object paths so that name order equals version order.
pub trait NameComparer: Send + Sync {
    fn compare(&self, left: &str, right: &str) -> Ordering;
}

/// Lexicographic byte order. Correct for fixed-width timestamp versions.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrdinalNameComparer;

impl NameComparer for OrdinalNameComparer {
    fn compare(&self, left: &str, right: &str) -> Ordering {
        left.cmp(right)
    }
}

/// Orders by the placeholder value parsed as an unsigned integer.
///
/// Correct for number versions, where `10` must follow `9`. Paths whose
/// placeholder is not a number sort after all numeric ones, lexicographically
/// among themselves.
#[derive(Clone, Debug)]
pub struct NumericNameComparer {
    template: PathTemplate,
}

impl NumericNameComparer {
    pub fn new(template: PathTemplate) -> Self {
        Self { template }
    }

    fn number(&self, path: &str) -> Option<u64> {
        self.template.extract(path)?.parse().ok()
    }
}

impl NameComparer for NumericNameComparer {
    fn compare(&self, left: &str, right: &str) -> Ordering {
        match (self.number(left), self.number(right)) {
            (Some(l), Some(r)) => l.cmp(&r).then_with(|| left.cmp(right)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => left.cmp(right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(cmp: &dyn NameComparer, names: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        names.sort_by(|a, b| cmp.compare(a, b));
        names
    }

    #[test]
    fn ordinal_sorts_timestamps_chronologically() {
        let names = [
            "p/2015.01.02.03.04.10.0000000.txt",
            "p/2015.01.02.03.04.05.0000000.txt",
            "p/2016.01.01.00.00.00.0000000.txt",
        ];
        assert_eq!(
            sorted(&OrdinalNameComparer, &names),
            vec![
                "p/2015.01.02.03.04.05.0000000.txt",
                "p/2015.01.02.03.04.10.0000000.txt",
                "p/2016.01.01.00.00.00.0000000.txt",
            ]
        );
    }

    #[test]
    fn numeric_sorts_by_value() {
        let cmp = NumericNameComparer::new(PathTemplate::parse("p/{0}.txt").unwrap());
        assert_eq!(
            sorted(&cmp, &["p/10.txt", "p/9.txt", "p/x.txt", "p/100.txt", "p/1.txt"]),
            vec!["p/1.txt", "p/9.txt", "p/10.txt", "p/100.txt", "p/x.txt"]
        );
    }

    #[test]
    fn ordinal_would_misorder_numbers() {
        assert_eq!(
            sorted(&OrdinalNameComparer, &["p/10.txt", "p/9.txt"]),
            vec!["p/10.txt", "p/9.txt"]
        );
    }
}
