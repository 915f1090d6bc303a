use indexmap::IndexMap;

use crate::Error;

/// Characters that delimit the parts of a metric line, and so cannot appear in a metric name.
const RESERVED_NAME_CHARS: &[char] = &[':', '|', '\n'];

/// Checks that `name` can be written at the start of a metric line.
pub(crate) fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidMetricName { name: name.to_string(), reason: "name is empty" });
    }

    if name.contains(RESERVED_NAME_CHARS) {
        return Err(Error::InvalidMetricName {
            name: name.to_string(),
            reason: "name contains one of ':', '|' or a newline",
        });
    }

    Ok(())
}

/// A set of metric updates sent together by one call.
///
/// Maps each metric name to one or more pre-formatted value fragments (see the [`format`][crate::format] module).
/// Every name is sent as its own datagram. When a name holds several fragments, they travel in that name's datagram as
/// newline-separated lines, which lets a single call report, for example, two readings of the same gauge.
///
/// Names keep the order in which they were first inserted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    entries: IndexMap<String, Vec<String>>,
}

impl Batch {
    /// Creates an empty `Batch`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value fragment for the given metric name.
    ///
    /// If the name is already present, the fragment is added after the existing ones rather than replacing them.
    ///
    /// # Errors
    ///
    /// If the name is empty, or contains a character reserved by the line protocol, an error is returned and the batch
    /// is left unchanged.
    pub fn insert<N, F>(&mut self, name: N, fragment: F) -> Result<(), Error>
    where
        N: Into<String>,
        F: Into<String>,
    {
        let name = name.into();
        validate_name(&name)?;

        self.entries.entry(name).or_default().push(fragment.into());
        Ok(())
    }

    /// Returns the number of distinct metric names, which is also the number of datagrams the batch is sent as.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the batch holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value fragments stored for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Iterates over the metric names and their value fragments, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(name, fragments)| (name.as_str(), fragments.as_slice()))
    }

    /// Applies `f` to every value fragment in place.
    pub(crate) fn for_each_fragment_mut<F>(&mut self, f: F)
    where
        F: FnMut(&mut String),
    {
        self.entries.values_mut().flat_map(|fragments| fragments.iter_mut()).for_each(f);
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_name, Batch};
    use crate::Error;

    #[test]
    fn name_validation() {
        // Cases are defined as: metric name, whether or not it is valid.
        let cases = [
            ("requests", true),
            ("api.requests.count", true),
            ("with-dash_and_underscore", true),
            ("rate@peak", true),
            ("", false),
            ("has:colon", false),
            ("has|pipe", false),
            ("has\nnewline", false),
        ];

        for (name, valid) in cases {
            assert_eq!(validate_name(name).is_ok(), valid, "name: {name:?}");
        }
    }

    #[test]
    fn duplicate_names_keep_every_fragment() {
        let mut batch = Batch::new();
        batch.insert("k", "55|g").unwrap();
        batch.insert("other", "1|c").unwrap();
        batch.insert("k", "56|g").unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get("k"), Some(&["55|g".to_string(), "56|g".to_string()][..]));

        let names = batch.iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, ["k", "other"]);
    }

    #[test]
    fn rejected_insert_leaves_batch_unchanged() {
        let mut batch = Batch::new();
        let result = batch.insert("bad:name", "1|c");

        assert_eq!(
            result,
            Err(Error::InvalidMetricName {
                name: "bad:name".to_string(),
                reason: "name contains one of ':', '|' or a newline",
            })
        );
        assert!(batch.is_empty());
    }
}
