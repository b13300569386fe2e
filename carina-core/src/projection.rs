//! Projection - Split list results into parallel identifier/name columns

use crate::resource::Value;

/// ARNs and names of listed items, index-aligned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub arns: Vec<String>,
    pub names: Vec<String>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.arns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arns.is_empty()
    }

    /// Pairs of (arn, name)
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.arns
            .iter()
            .map(String::as_str)
            .zip(self.names.iter().map(String::as_str))
    }

    pub fn arns_value(&self) -> Value {
        Value::string_list(self.arns.iter().cloned())
    }

    pub fn names_value(&self) -> Value {
        Value::string_list(self.names.iter().cloned())
    }
}

/// Extract `(arn, name)` from every item
///
/// Missing fields become empty strings; items are never dropped, so
/// `arns[i]` and `names[i]` always describe the same item.
pub fn project<T>(items: &[T], fields: impl Fn(&T) -> (Option<&str>, Option<&str>)) -> Projection {
    let mut projection = Projection {
        arns: Vec::with_capacity(items.len()),
        names: Vec::with_capacity(items.len()),
    };

    for item in items {
        let (arn, name) = fields(item);
        projection.arns.push(arn.unwrap_or_default().to_string());
        projection.names.push(name.unwrap_or_default().to_string());
    }

    projection
}
