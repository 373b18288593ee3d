//! Business rules gating items dynamically.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use keystone_core::SubjectId;

/// Call-time parameters passed through to rules.
pub type Params = HashMap<String, JsonValue>;

/// A named predicate deciding whether an item's grant applies.
///
/// Rules may run on the hot path of every access check: keep them pure and fast.
pub trait Rule: Send + Sync {
    fn execute(&self, subject: Option<&SubjectId>, item_name: &str, params: &Params) -> bool;
}

impl<F> Rule for F
where
    F: Fn(Option<&SubjectId>, &str, &Params) -> bool + Send + Sync,
{
    fn execute(&self, subject: Option<&SubjectId>, item_name: &str, params: &Params) -> bool {
        self(subject, item_name, params)
    }
}

/// Resolves rule names to executable rules.
pub trait RuleFactory: Send + Sync {
    fn create(&self, name: &str) -> Option<Arc<dyn Rule>>;
}

impl<S> RuleFactory for Arc<S>
where
    S: RuleFactory + ?Sized,
{
    fn create(&self, name: &str) -> Option<Arc<dyn Rule>> {
        (**self).create(name)
    }
}

/// Name → rule map.
#[derive(Default, Clone)]
pub struct RuleRegistry {
    rules: HashMap<String, Arc<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, rule: impl Rule + 'static) -> &mut Self {
        self.rules.insert(name.into(), Arc::new(rule));
        self
    }

    pub fn with(mut self, name: impl Into<String>, rule: impl Rule + 'static) -> Self {
        self.register(name, rule);
        self
    }

    /// Register a closure; the explicit `Fn` bound lets closure signatures be inferred.
    pub fn with_fn<F>(self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(Option<&SubjectId>, &str, &Params) -> bool + Send + Sync + 'static,
    {
        self.with(name, rule)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }
}

impl core::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("RuleRegistry").field("rules", &names).finish()
    }
}

impl RuleFactory for RuleRegistry {
    fn create(&self, name: &str) -> Option<Arc<dyn Rule>> {
        self.rules.get(name).cloned()
    }
}
