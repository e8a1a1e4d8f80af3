// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of capabilities, indexed by name and category.
//!
//! The name map and the category index live behind one lock, so readers
//! always see both reflect the same set of registrations.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use trellis_core::operator::field_mismatch;
use trellis_core::{Children, FieldSpec, Operator, TrellisError, TypedValue, ValueKind};

use crate::metadata::ToolCategory;
use crate::response::ToolResponse;
use crate::tool::Capability;

static REGISTRY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("categories", ValueKind::Dict),
    FieldSpec::new("tools", ValueKind::Dict),
];

#[derive(Default)]
struct RegistryIndex {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Capability>>,
    categories: BTreeMap<ToolCategory, BTreeSet<String>>,
}

impl RegistryIndex {
    fn check(&self, tool: &Arc<dyn Capability>) -> Result<bool, TrellisError> {
        match self.tools.get(tool.name()) {
            Some(existing) if std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(tool)) => {
                Ok(false)
            }
            Some(_) => Err(TrellisError::DuplicateName {
                name: tool.name().to_string(),
            }),
            None => Ok(true),
        }
    }

    fn insert(&mut self, tool: Arc<dyn Capability>) {
        let name = tool.name().to_string();
        self.categories
            .entry(tool.metadata().category)
            .or_default()
            .insert(name.clone());
        self.order.push(name.clone());
        self.tools.insert(name, tool);
    }

    fn remove(&mut self, name: &str) -> Option<Arc<dyn Capability>> {
        let tool = self.tools.remove(name)?;
        self.order.retain(|n| n != name);
        self.categories.retain(|_, names| {
            names.remove(name);
            !names.is_empty()
        });
        Some(tool)
    }

    fn in_order(&self) -> impl Iterator<Item = &Arc<dyn Capability>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }
}

/// Directory of capabilities supporting lookup, dispatch, and schema export.
///
/// Shared by reference (`Arc<ToolRegistry>`); all methods take `&self`
/// except the container operations inherited from [`Operator`].
#[derive(Default)]
pub struct ToolRegistry {
    index: RwLock<RegistryIndex>,
    children: Children,
    default_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout for registered tools that declare none.
    ///
    /// Applies to tools already registered and to every later registration.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        for tool in self.read().tools.values() {
            tool.core().set_default_timeout(timeout);
        }
        self
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    fn adopt(&self, tool: &Arc<dyn Capability>) {
        if let Some(timeout) = self.default_timeout {
            tool.core().set_default_timeout(timeout);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a capability under its own name.
    ///
    /// Registering the same `Arc` again is a no-op; a different capability
    /// with a taken name fails with [`TrellisError::DuplicateName`].
    pub fn register(&self, tool: Arc<dyn Capability>) -> Result<(), TrellisError> {
        let mut index = self.write();
        if !index.check(&tool)? {
            debug!(tool = %tool.name(), "tool already registered");
            return Ok(());
        }
        info!(tool = %tool.name(), category = %tool.metadata().category, "registered tool");
        self.adopt(&tool);
        index.insert(tool);
        Ok(())
    }

    /// Registers every capability or none of them.
    pub fn register_all(&self, tools: Vec<Arc<dyn Capability>>) -> Result<(), TrellisError> {
        let mut index = self.write();
        let mut batch: Vec<Arc<dyn Capability>> = Vec::with_capacity(tools.len());
        for tool in tools {
            let clashes_in_batch = batch.iter().find(|t| t.name() == tool.name());
            match clashes_in_batch {
                Some(prev) if std::ptr::addr_eq(Arc::as_ptr(prev), Arc::as_ptr(&tool)) => continue,
                Some(_) => {
                    return Err(TrellisError::DuplicateName {
                        name: tool.name().to_string(),
                    });
                }
                None => {}
            }
            if index.check(&tool)? {
                batch.push(tool);
            }
        }
        for tool in batch {
            info!(tool = %tool.name(), category = %tool.metadata().category, "registered tool");
            self.adopt(&tool);
            index.insert(tool);
        }
        Ok(())
    }

    /// Removes a capability from the name map and the category index together.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Capability>> {
        let removed = self.write().remove(name);
        if removed.is_some() {
            info!(tool = %name, "removed tool");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.read().tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().order.clone()
    }

    /// `(name, description)` pairs sorted by name.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .read()
            .tools
            .values()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect();
        entries.sort();
        entries
    }

    pub fn names_in_category(&self, category: ToolCategory) -> Vec<String> {
        self.read()
            .categories
            .get(&category)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Categories with at least one registered tool.
    pub fn categories(&self) -> Vec<ToolCategory> {
        self.read().categories.keys().copied().collect()
    }

    /// Dispatches a call by name. Unknown names yield a failure envelope.
    pub async fn call(&self, name: &str, arguments: Value) -> ToolResponse {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "call to unknown tool");
            return ToolResponse::unknown_capability(name);
        };
        tool.call(arguments).await
    }

    /// Calling schemas of enabled tools, in registration order.
    pub fn all_schemas(&self) -> Vec<Value> {
        self.read()
            .in_order()
            .filter(|t| t.is_enabled())
            .map(|t| t.to_calling_schema())
            .collect()
    }

    /// `all_schemas` wrapped as `{type: "function", function: {...}}`.
    pub fn calling_conventions(&self) -> Vec<Value> {
        self.all_schemas()
            .into_iter()
            .map(|schema| json!({ "type": "function", "function": schema }))
            .collect()
    }

    /// Every tool's full schema plus the category index.
    pub fn catalog(&self) -> Value {
        let index = self.read();
        let tools: Map<String, Value> = index
            .in_order()
            .map(|t| (t.name().to_string(), t.get_schema()))
            .collect();
        json!({
            "tools": tools,
            "categories": category_map(&index.categories),
        })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("children", &self.children)
            .finish()
    }
}

fn category_map(categories: &BTreeMap<ToolCategory, BTreeSet<String>>) -> Map<String, Value> {
    categories
        .iter()
        .map(|(category, names)| (category.to_string(), json!(names)))
        .collect()
}

impl Operator for ToolRegistry {
    fn type_name(&self) -> &str {
        "ToolRegistry"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        REGISTRY_FIELDS
    }

    fn field(&self, name: &str) -> Option<TypedValue> {
        let index = self.read();
        match name {
            "categories" => Some(TypedValue::Dict(category_map(&index.categories))),
            "tools" => Some(TypedValue::Dict(
                index
                    .in_order()
                    .map(|t| (t.name().to_string(), Value::Object(t.core().export_state())))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// `categories` is derived and ignored on load. `tools` restores runtime
    /// status of live tools; saved tools that are not registered are skipped.
    fn set_field(&mut self, name: &str, value: TypedValue) -> Result<(), TrellisError> {
        match (name, value) {
            ("categories", TypedValue::Dict(_)) => Ok(()),
            ("tools", TypedValue::Dict(saved)) => {
                for (tool_name, state) in &saved {
                    let Some(tool) = self.get(tool_name) else {
                        warn!(tool = %tool_name, "saved state for unregistered tool skipped");
                        continue;
                    };
                    let Value::Object(state) = state else {
                        return Err(TrellisError::Deserialization {
                            message: format!("saved state of tool `{tool_name}` is not an object"),
                            source: None,
                        });
                    };
                    tool.core().restore_runtime(state)?;
                }
                Ok(())
            }
            (_, value) => match REGISTRY_FIELDS.iter().find(|f| f.name == name) {
                Some(spec) => Err(field_mismatch("ToolRegistry", name, spec.kind, &value)),
                None => Err(trellis_core::operator::unknown_field("ToolRegistry", name)),
            },
        }
    }

    fn children(&self) -> Option<&Children> {
        Some(&self.children)
    }

    fn children_mut(&mut self) -> Option<&mut Children> {
        Some(&mut self.children)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::local::LocalTool;
    use crate::parameter::{ParamKind, ToolParameter};

    fn add() -> Arc<dyn Capability> {
        Arc::new(
            LocalTool::builder("add")
                .description("Adds two numbers")
                .category(ToolCategory::Calculation)
                .param(ToolParameter::new("a", ParamKind::Number))
                .param(ToolParameter::new("b", ParamKind::Number))
                .sync_handler(|args| Ok(json!(args.f64("a")? + args.f64("b")?)))
                .build()
                .unwrap(),
        )
    }

    fn search() -> Arc<dyn Capability> {
        Arc::new(
            LocalTool::builder("search")
                .description("Searches")
                .category(ToolCategory::Search)
                .param(ToolParameter::new("query", ParamKind::String))
                .sync_handler(|args| Ok(json!([args.str("query")?])))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn duplicate_names_are_rejected_but_same_arc_is_a_no_op() {
        let registry = ToolRegistry::new();
        let tool = add();
        registry.register(Arc::clone(&tool)).unwrap();
        registry.register(Arc::clone(&tool)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["add"]);

        let err = registry.register(add()).unwrap_err();
        assert!(matches!(err, TrellisError::DuplicateName { name } if name == "add"));
    }

    #[test]
    fn register_all_is_atomic() {
        let registry = ToolRegistry::new();
        registry.register(add()).unwrap();
        let err = registry.register_all(vec![search(), add()]);
        assert!(err.is_err());
        assert!(!registry.contains("search"));

        let err = registry.register_all(vec![search(), search()]);
        assert!(err.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_updates_name_map_and_categories() {
        let registry = ToolRegistry::new();
        registry.register_all(vec![add(), search()]).unwrap();
        assert_eq!(
            registry.categories(),
            vec![ToolCategory::Search, ToolCategory::Calculation]
        );
        assert!(registry.remove("add").is_some());
        assert!(registry.names_in_category(ToolCategory::Calculation).is_empty());
        assert_eq!(registry.categories(), vec![ToolCategory::Search]);
        assert!(registry.remove("add").is_none());
    }

    #[tokio::test]
    async fn dispatch_known_and_unknown_names() {
        let registry = ToolRegistry::new();
        registry.register(add()).unwrap();

        let ok = registry.call("add", json!({"a": 2, "b": 3})).await;
        assert!(ok.success);
        assert_eq!(ok.result, Some(json!(5.0)));

        let missing = registry.call("subtract", json!({"a": 2, "b": 3})).await;
        assert!(!missing.success);
        assert_eq!(missing.error.as_deref(), Some("unknown capability"));
    }

    #[test]
    fn schemas_skip_disabled_tools_and_keep_order() {
        let registry = ToolRegistry::new();
        registry.register_all(vec![search(), add()]).unwrap();
        let names: Vec<Value> = registry.all_schemas().iter().map(|s| s["name"].clone()).collect();
        assert_eq!(names, vec![json!("search"), json!("add")]);

        registry.get("search").unwrap().disable();
        let conventions = registry.calling_conventions();
        assert_eq!(conventions.len(), 1);
        assert_eq!(conventions[0]["type"], "function");
        assert_eq!(conventions[0]["function"]["name"], "add");
    }

    #[test]
    fn list_is_sorted_and_catalog_has_categories() {
        let registry = ToolRegistry::new();
        registry.register_all(vec![search(), add()]).unwrap();
        assert_eq!(
            registry.list(),
            vec![
                ("add".to_string(), "Adds two numbers".to_string()),
                ("search".to_string(), "Searches".to_string()),
            ]
        );
        let catalog = registry.catalog();
        assert_eq!(catalog["categories"]["calculation"], json!(["add"]));
        assert!(catalog["tools"]["search"]["calling_schema"].is_object());
    }

    #[tokio::test]
    async fn state_roundtrip_restores_counters_and_flags() {
        let registry = ToolRegistry::new();
        registry.register_all(vec![add(), search()]).unwrap();
        registry.call("add", json!({"a": 1, "b": 1})).await;
        registry.call("search", json!({})).await;
        registry.get("search").unwrap().disable();
        let state = registry.export_state();

        let mut restored = ToolRegistry::new();
        restored.register_all(vec![add(), search()]).unwrap();
        restored.load_state(&state, true).unwrap();
        assert_eq!(restored.get("add").unwrap().status().call_count, 1);
        let search = restored.get("search").unwrap();
        assert_eq!(search.status().error_count, 1);
        assert!(!search.is_enabled());
    }

    #[test]
    #[tracing_test::traced_test]
    fn load_skips_unregistered_tools() {
        let source = ToolRegistry::new();
        source.register(add()).unwrap();
        let state = source.export_state();

        let mut target = ToolRegistry::new();
        target.load_state(&state, true).unwrap();
        assert!(target.is_empty());
        assert!(logs_contain("saved state for unregistered tool skipped"));
    }

    #[tokio::test]
    async fn readers_never_see_half_registered_tools() {
        let registry = Arc::new(ToolRegistry::new());
        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for _ in 0..200 {
                    registry.register(add()).unwrap();
                    registry.remove("add");
                }
            })
        };
        for _ in 0..200 {
            let catalog = registry.catalog();
            let listed = catalog["tools"].as_object().unwrap().contains_key("add");
            let indexed = catalog["categories"].get("calculation").is_some();
            assert_eq!(listed, indexed);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }
}
