//! Store configuration.
//!
//! A store is named once, when it is constructed. The configured name is the
//! store's default; an instance may override it with a fixed name or derive
//! one from the default (e.g. `"book"` becomes `"book-1"`).

use std::fmt;

/// Key under which entities carry their id unless configured otherwise.
pub const DEFAULT_ID_KEY: &str = "id";

/// Per-instance override of a store's name.
pub enum StoreName {
    /// Use this name as-is.
    Fixed(String),
    /// Compute the name from the configured default.
    Derived(Box<dyn Fn(&str) -> String>),
}

impl StoreName {
    /// Derive the instance name from the default name.
    pub fn derived(f: impl Fn(&str) -> String + 'static) -> Self {
        StoreName::Derived(Box::new(f))
    }
}

impl fmt::Debug for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreName::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            StoreName::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl From<&str> for StoreName {
    fn from(name: &str) -> Self {
        StoreName::Fixed(name.to_string())
    }
}

impl From<String> for StoreName {
    fn from(name: String) -> Self {
        StoreName::Fixed(name)
    }
}

/// Configuration passed to a store constructor.
#[derive(Debug)]
pub struct StoreConfig {
    /// Default store name
    pub name: String,
    /// Optional per-instance name override
    pub instance_name: Option<StoreName>,
    /// Field holding each entity's id (entity stores only)
    pub id_key: String,
}

impl StoreConfig {
    /// Create a config with the given default name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_name: None,
            id_key: DEFAULT_ID_KEY.to_string(),
        }
    }

    /// Override the name of this particular instance.
    pub fn instance_name(mut self, name: impl Into<StoreName>) -> Self {
        self.instance_name = Some(name.into());
        self
    }

    /// Use a different field as the entity id.
    pub fn id_key(mut self, key: impl Into<String>) -> Self {
        self.id_key = key.into();
        self
    }

    /// Resolve the name the store will carry for its whole lifetime.
    pub fn resolve_name(&self) -> String {
        match &self.instance_name {
            None => self.name.clone(),
            Some(StoreName::Fixed(name)) => name.clone(),
            Some(StoreName::Derived(f)) => f(&self.name),
        }
    }
}

impl From<&str> for StoreConfig {
    fn from(name: &str) -> Self {
        StoreConfig::new(name)
    }
}

impl From<String> for StoreConfig {
    fn from(name: String) -> Self {
        StoreConfig::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_and_id_key() {
        let config = StoreConfig::new("todos");
        assert_eq!(config.resolve_name(), "todos");
        assert_eq!(config.id_key, "id");
    }

    #[test]
    fn fixed_instance_name() {
        let config = StoreConfig::new("book").instance_name("book-2");
        assert_eq!(config.resolve_name(), "book-2");
    }

    #[test]
    fn derived_instance_name() {
        let config =
            StoreConfig::new("book").instance_name(StoreName::derived(|name| format!("{name}-1")));
        assert_eq!(config.resolve_name(), "book-1");
    }

    #[test]
    fn custom_id_key() {
        let config = StoreConfig::from("todos").id_key("todoId");
        assert_eq!(config.id_key, "todoId");
    }
}
