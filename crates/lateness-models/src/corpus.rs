//! Documents and insertion-ordered corpora.

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::MultiVector;

/// Raw text of a document before encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    #[serde(default)]
    pub title: String,
    pub text: String,
}

impl DocumentText {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// An encoded document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
    pub embeddings: MultiVector,
}

/// Mapping of document id to text that iterates in insertion order.
///
/// Inserting an id that is already present replaces its text in place.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<(String, DocumentText)>,
    positions: HashMap<String, usize>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document, returning the previous text for that id.
    pub fn insert(&mut self, id: impl Into<String>, doc: DocumentText) -> Option<DocumentText> {
        let id = id.into();
        if let Some(&pos) = self.positions.get(&id) {
            return Some(std::mem::replace(&mut self.entries[pos].1, doc));
        }
        self.positions.insert(id.clone(), self.entries.len());
        self.entries.push((id, doc));
        None
    }

    pub fn get(&self, id: &str) -> Option<&DocumentText> {
        self.positions.get(id).map(|&pos| &self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentText)> {
        self.entries.iter().map(|(id, doc)| (id.as_str(), doc))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Entries in insertion order, split into chunks of `size`.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn batches(&self, size: usize) -> std::slice::Chunks<'_, (String, DocumentText)> {
        self.entries.chunks(size)
    }
}

impl<K: Into<String>> FromIterator<(K, DocumentText)> for Corpus {
    fn from_iter<I: IntoIterator<Item = (K, DocumentText)>>(iter: I) -> Self {
        let mut corpus = Corpus::new();
        for (id, doc) in iter {
            corpus.insert(id, doc);
        }
        corpus
    }
}

/// Serialized as a JSON-style object; keys keep their order.
impl Serialize for Corpus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, doc) in &self.entries {
            map.serialize_entry(id, doc)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Corpus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CorpusVisitor;

        impl<'de> Visitor<'de> for CorpusVisitor {
            type Value = Corpus;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of document id to {title, text}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Corpus, A::Error> {
                let mut corpus = Corpus::new();
                while let Some((id, doc)) = access.next_entry::<String, DocumentText>()? {
                    corpus.insert(id, doc);
                }
                Ok(corpus)
            }
        }

        deserializer.deserialize_map(CorpusVisitor)
    }
}
