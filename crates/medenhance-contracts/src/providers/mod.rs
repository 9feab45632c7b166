use std::sync::Arc;

/// Ordered set of named providers. Order is priority: the first entry is
/// tried first.
#[derive(Debug, Clone)]
pub struct ProviderRegistry<T: NamedProvider> {
    providers: Vec<T>,
}

pub trait NamedProvider {
    fn name(&self) -> &str;
}

impl<T: NamedProvider + ?Sized> NamedProvider for Arc<T> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }
}

impl<T: NamedProvider> ProviderRegistry<T> {
    pub fn new(providers: Vec<T>) -> Self {
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
    }

    /// Names in priority order.
    pub fn priority(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|provider| provider.name().to_string())
            .collect()
    }

    pub fn providers(&self) -> &[T] {
        self.providers.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl<T: NamedProvider + Clone> ProviderRegistry<T> {
    /// Re-orders the registry to follow `names`. Returns the reordered
    /// registry and the requested names that matched no provider.
    pub fn reordered(&self, names: &[String]) -> (Self, Vec<String>) {
        let mut providers: Vec<T> = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty() || providers.iter().any(|provider| provider.name() == name) {
                continue;
            }
            match self.get(name) {
                Some(provider) => providers.push(provider.clone()),
                None => unknown.push(name.to_string()),
            }
        }
        (Self { providers }, unknown)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{NamedProvider, ProviderRegistry};

    #[derive(Clone, Debug)]
    struct DummyProvider {
        name: String,
    }

    impl NamedProvider for DummyProvider {
        fn name(&self) -> &str {
            self.name.as_str()
        }
    }

    fn dummy(name: &str) -> DummyProvider {
        DummyProvider {
            name: name.to_string(),
        }
    }

    #[test]
    fn registry_keeps_priority_order() {
        let registry = ProviderRegistry::new(vec![dummy("z"), dummy("a"), dummy("m")]);
        assert_eq!(registry.priority(), vec!["z", "a", "m"]);
        assert_eq!(registry.get("a").map(|p| p.name()), Some("a"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn reordered_follows_requested_names_and_reports_unknown() {
        let registry = ProviderRegistry::new(vec![dummy("groq"), dummy("bedrock")]);
        let names = vec![
            "bedrock".to_string(),
            "nope".to_string(),
            "groq".to_string(),
            "bedrock".to_string(),
        ];
        let (reordered, unknown) = registry.reordered(&names);
        assert_eq!(reordered.priority(), vec!["bedrock", "groq"]);
        assert_eq!(unknown, vec!["nope"]);
    }

    #[test]
    fn shared_providers_are_named_through_arc() {
        let registry: ProviderRegistry<Arc<DummyProvider>> =
            ProviderRegistry::new(vec![Arc::new(dummy("primary"))]);
        assert_eq!(registry.priority(), vec!["primary"]);
        assert_eq!(registry.providers().len(), 1);
        assert!(!registry.is_empty());
        assert!(ProviderRegistry::<DummyProvider>::new(Vec::new()).is_empty());
    }
}
