//! MIME headers attached to a SOAP message

/// Ordered multimap of MIME header entries.
///
/// Entries keep their insertion order and the spelling of their name as
/// given. Lookups compare names ASCII case-insensitively, like MIME header
/// names are compared on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeHeaders {
    entries: Vec<(String, String)>,
}

impl MimeHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value for `name`, keeping the values already present
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single `value`
    ///
    /// The replacement takes the position of the first existing entry, or is
    /// appended when `name` was absent.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => {
                self.entries[index] = (name.clone(), value);
                let mut i = index + 1;
                while i < self.entries.len() {
                    if self.entries[i].0.eq_ignore_ascii_case(&name) {
                        self.entries.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => self.entries.push((name, value)),
        }
    }

    /// All values of `name` in insertion order, `None` when absent
    pub fn get_header(&self, name: &str) -> Option<Vec<&str>> {
        let values: Vec<&str> = self
            .entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect();
        if values.is_empty() { None } else { Some(values) }
    }

    pub fn remove_header(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn remove_all_headers(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}
