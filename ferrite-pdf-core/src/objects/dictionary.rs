use super::Object;
use indexmap::IndexMap;

/// PDF dictionary. Keys keep their insertion order so rewritten files
/// list entries the way the source did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<String, Object>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Object>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.entries.get_mut(key)
    }

    /// Removes `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Object> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Object)> {
        self.entries.iter_mut()
    }

    /// Owned copy of the key set, for callers that mutate while walking.
    pub fn key_snapshot(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(|obj| match obj {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        })
    }

    /// Value of the `/Type` entry.
    pub fn get_type(&self) -> Option<&str> {
        self.get_name("Type")
    }
}

impl FromIterator<(String, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (String, Object)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Dictionary {
    type Item = (String, Object);
    type IntoIter = indexmap::map::IntoIter<String, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a String, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, String, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectId;

    #[test]
    fn test_set_and_get() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("Page"));
        dict.set("Rotate", 90);
        dict.set("Parent", ObjectId::new(2, 0));

        assert_eq!(dict.get_type(), Some("Page"));
        assert_eq!(dict.get_integer("Rotate"), Some(90));
        assert_eq!(
            dict.get("Parent"),
            Some(&Object::Reference(ObjectId::new(2, 0)))
        );
        assert_eq!(dict.get("Missing"), None);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut dict = Dictionary::new();
        dict.set("Zeta", 1);
        dict.set("Alpha", 2);
        dict.set("Mid", 3);
        dict.remove("Alpha");
        dict.set("Beta", 4);

        let keys: Vec<_> = dict.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Zeta", "Mid", "Beta"]);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut dict = Dictionary::new();
        dict.set("A", 1);
        dict.set("B", 2);
        dict.set("A", 3);

        let entries: Vec<_> = dict.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        assert_eq!(
            entries,
            vec![
                ("A".to_string(), Object::Integer(3)),
                ("B".to_string(), Object::Integer(2))
            ]
        );
    }

    #[test]
    fn test_key_snapshot_allows_mutation() {
        let mut dict = Dictionary::new();
        dict.set("A", 1);
        dict.set("B", 2);

        for key in dict.key_snapshot() {
            if let Some(Object::Integer(v)) = dict.get_mut(&key) {
                *v *= 10;
            }
            dict.set(format!("{key}2"), 0);
        }

        assert_eq!(dict.get_integer("A"), Some(10));
        assert_eq!(dict.get_integer("B"), Some(20));
        assert_eq!(dict.len(), 4);
    }

    #[test]
    fn test_get_dict() {
        let mut inner = Dictionary::new();
        inner.set("F1", ObjectId::new(7, 0));
        let mut dict = Dictionary::new();
        dict.set("Font", inner.clone());

        assert_eq!(dict.get_dict("Font"), Some(&inner));
        assert_eq!(dict.get_dict("Missing"), None);
    }

    #[test]
    fn test_clear() {
        let mut dict: Dictionary = vec![
            ("A".to_string(), Object::Integer(1)),
            ("B".to_string(), Object::Integer(2)),
        ]
        .into_iter()
        .collect();

        assert_eq!(dict.len(), 2);
        dict.clear();
        assert!(dict.is_empty());
    }
}
