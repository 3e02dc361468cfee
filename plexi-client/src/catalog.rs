//! The built-in catalog of selectable models.
//!
//! The catalog is a capability table, not a live API listing: Perplexity has
//! no models endpoint, so the set of servable models and their descriptors is
//! maintained here. Insertion order is preserved; the first entry doubles as
//! the fallback selection when a persisted model name has disappeared.

/// Model the client selects when none has been chosen explicitly.
pub const DEFAULT_MODEL: &str = "llama-3.1-sonar-small-128k-online";

/// Descriptor for one selectable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCard {
    /// Parameter-count label, e.g. "8B".
    pub parameters: &'static str,
    /// Maximum context length in tokens.
    pub context_length: u32,
    /// Model type label.
    pub kind: &'static str,
    /// Availability label: an open-source provenance tag or the hosting
    /// provider's name.
    pub availability: &'static str,
}

const CHAT_COMPLETION: &str = "chat completion";
const OPEN_SOURCE: &str = "open source";
const HOSTED: &str = "Perplexity";

const BUILTIN: &[(&str, ModelCard)] = &[
    (
        "llama-3.1-sonar-small-128k-online",
        ModelCard {
            parameters: "8B",
            context_length: 127_072,
            kind: CHAT_COMPLETION,
            availability: HOSTED,
        },
    ),
    (
        "llama-3.1-sonar-large-128k-online",
        ModelCard {
            parameters: "70B",
            context_length: 127_072,
            kind: CHAT_COMPLETION,
            availability: HOSTED,
        },
    ),
    (
        "llama-3.1-sonar-huge-128k-online",
        ModelCard {
            parameters: "405B",
            context_length: 127_072,
            kind: CHAT_COMPLETION,
            availability: HOSTED,
        },
    ),
    (
        "llama-3.1-8b-instruct",
        ModelCard {
            parameters: "8B",
            context_length: 131_072,
            kind: CHAT_COMPLETION,
            availability: OPEN_SOURCE,
        },
    ),
    (
        "llama-3.1-70b-instruct",
        ModelCard {
            parameters: "70B",
            context_length: 131_072,
            kind: CHAT_COMPLETION,
            availability: OPEN_SOURCE,
        },
    ),
];

/// Ordered mapping from model name to its [`ModelCard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    entries: Vec<(&'static str, ModelCard)>,
}

impl ModelCatalog {
    /// The built-in Perplexity catalog.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN.to_vec(),
        }
    }

    /// Look up the descriptor for a model name.
    pub fn get(&self, name: &str) -> Option<&ModelCard> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, card)| card)
    }

    /// Whether the catalog contains a model name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Model names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    /// Catalog entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ModelCard)> {
        self.entries.iter().map(|(name, card)| (*name, card))
    }

    /// First model name in catalog order.
    pub fn first(&self) -> Option<&'static str> {
        self.entries.first().map(|(name, _)| *name)
    }

    /// Number of catalog entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_default_model() {
        let catalog = ModelCatalog::builtin();
        assert!(catalog.contains(DEFAULT_MODEL));
    }

    #[test]
    fn default_model_is_first_entry() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(catalog.first(), Some(DEFAULT_MODEL));
    }

    #[test]
    fn get_returns_descriptor_fields() {
        let catalog = ModelCatalog::builtin();
        let card = catalog.get("llama-3.1-70b-instruct").unwrap();
        assert_eq!(card.parameters, "70B");
        assert_eq!(card.context_length, 131_072);
        assert_eq!(card.kind, "chat completion");
        assert_eq!(card.availability, "open source");
    }

    #[test]
    fn get_unknown_model_returns_none() {
        let catalog = ModelCatalog::builtin();
        assert!(catalog.get("bogus-llm-1b").is_none());
        assert!(!catalog.contains("bogus-llm-1b"));
    }

    #[test]
    fn catalog_is_stable_across_builds() {
        let first = ModelCatalog::builtin();
        let second = ModelCatalog::builtin();
        assert_eq!(first, second);
        assert!(first.names().eq(second.names()));
    }

    #[test]
    fn names_preserve_insertion_order() {
        let catalog = ModelCatalog::builtin();
        let names: Vec<_> = catalog.names().collect();
        assert_eq!(names.len(), catalog.len());
        assert_eq!(names[0], DEFAULT_MODEL);
        assert!(names.contains(&"llama-3.1-8b-instruct"));
    }

    #[test]
    fn every_entry_is_a_chat_completion_model() {
        let catalog = ModelCatalog::builtin();
        assert!(!catalog.is_empty());
        for (_, card) in catalog.iter() {
            assert_eq!(card.kind, "chat completion");
            assert!(card.context_length > 0);
        }
    }
}
