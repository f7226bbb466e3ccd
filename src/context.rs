//! Query context: table registry, configuration, fallback loaders, the active
//! engine and the function registry for one caller.
//!
//! A context is owned by one caller at a time; concurrent queries need their
//! own contexts (`Context::clone` shares tables cheaply but the loaders and
//! function registry are shared handles).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::engine::{DirectoryLoader, Engine, LocalEngine, Table, TableLoader};
use crate::error::{Result, SelectError};
use crate::functions::{FunctionRegistry, ScalarUdf};
use crate::ident::is_external;

/// Config key: LOAD with an alias removes the unaliased registry entry.
pub const ALIAS_REPLACE_KEY: &str = "load.alias_replace";

#[derive(Clone)]
pub struct Context {
    tables: HashMap<String, Table>,
    config: Map<String, Value>,
    loaders: Vec<Arc<dyn TableLoader>>,
    engine: Arc<dyn Engine>,
    functions: FunctionRegistry,
}

impl Default for Context {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tables: Vec<&String> = self.tables.keys().collect();
        tables.sort();
        f.debug_struct("Context")
            .field("tables", &tables)
            .field("config", &self.config)
            .field("loaders", &self.loaders.len())
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl Context {
    /// Empty context on the local engine with the built-in functions.
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            config: Map::new(),
            loaders: Vec::new(),
            engine: Arc::new(LocalEngine),
            functions: FunctionRegistry::with_builtins(),
        }
    }

    pub fn with_tables<I, K, T>(tables: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Table>,
    {
        let mut ctx = Self::new();
        for (k, t) in tables {
            ctx.add_table(&k.into(), t.into(), true);
        }
        ctx
    }

    pub fn engine(&self) -> Arc<dyn Engine> { self.engine.clone() }

    pub fn functions(&self) -> &FunctionRegistry { &self.functions }

    pub fn has_table(&self, key: &str) -> bool { self.tables.contains_key(key) }

    pub fn table_names(&self) -> Vec<String> {
        let mut v: Vec<String> = self.tables.keys().cloned().collect();
        v.sort();
        v
    }

    /// Register `table` under `key`. An existing key is kept (with a warning) unless `replace`.
    pub fn add_table(&mut self, key: &str, table: Table, replace: bool) {
        if self.tables.contains_key(key) && !replace {
            warn!(target: "framequery::context", "table {} already registered; keeping the existing entry", key);
            return;
        }
        self.tables.insert(key.to_string(), table);
    }

    pub fn remove_table(&mut self, key: &str) -> Option<Table> { self.tables.remove(key) }

    /// Registry first (never for sigil names), then the fallback loaders in
    /// order. Loader failures are logged and skipped; when nothing resolves the
    /// original not-found error is returned.
    pub fn resolve_table(&self, name: &str) -> Result<Table> {
        if !is_external(name) {
            if let Some(t) = self.tables.get(name) {
                return Ok(t.clone());
            }
        }
        for (i, loader) in self.loaders.iter().enumerate() {
            match loader.load(name) {
                Ok(Some(t)) => {
                    debug!(target: "framequery::context", "table {} resolved by fallback loader #{}", name, i);
                    return Ok(t);
                }
                Ok(None) => {}
                Err(e) => warn!(target: "framequery::context", "fallback loader #{} failed for {}: {}", i, name, e),
            }
        }
        Err(SelectError::TableNotFound(name.to_string()))
    }

    /// Resolve `source`; when an alias distinct from the source is given the
    /// table is also registered under it and, if `replace_alias` (default from
    /// `load.alias_replace`, itself defaulting to true), the source entry is dropped.
    pub fn load_table(&mut self, source: &str, alias: Option<&str>, replace_alias: Option<bool>) -> Result<Table> {
        let table = self.resolve_table(source)?;
        if let Some(alias) = alias.filter(|a| *a != source) {
            self.add_table(alias, table.clone(), true);
            let replace = match replace_alias {
                Some(r) => r,
                None => self.config_bool(ALIAS_REPLACE_KEY, true)?,
            };
            if replace && self.tables.remove(source).is_some() {
                debug!(target: "framequery::context", "alias {} replaces registry entry {}", alias, source);
            }
        }
        Ok(table)
    }

    pub fn config(&self) -> &Map<String, Value> { &self.config }

    /// Value for `key`, else `default`, else `ConfigNotFound`.
    pub fn get_config(&self, key: &str, default: Option<Value>) -> Result<Value> {
        match self.config.get(key) {
            Some(v) => Ok(v.clone()),
            None => default.ok_or_else(|| SelectError::ConfigNotFound(key.to_string())),
        }
    }

    pub fn set_config(&mut self, key: &str, value: Value) {
        self.config.insert(key.to_string(), value);
    }

    /// Merge `other` into the configuration, overwriting existing keys.
    pub fn merge_config(&mut self, other: Map<String, Value>) {
        for (k, v) in other {
            self.config.insert(k, v);
        }
    }

    /// Insert `value` into the list stored at `key` (created when absent).
    /// `position` defaults to the end; `clear` empties the list first.
    pub fn append_config(&mut self, key: &str, value: Value, position: Option<usize>, clear: bool) -> Result<()> {
        let entry = self.config.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
        let list = entry.as_array_mut().ok_or_else(|| SelectError::InvalidConfig {
            key: key.to_string(),
            reason: "not a list".into(),
        })?;
        if clear {
            list.clear();
        }
        let at = position.unwrap_or(list.len()).min(list.len());
        list.insert(at, value);
        Ok(())
    }

    pub fn config_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.config.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(SelectError::InvalidConfig { key: key.to_string(), reason: format!("expected a boolean, got {}", other) }),
        }
    }

    pub fn config_str(&self, key: &str) -> Result<Option<String>> {
        match self.config.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(SelectError::InvalidConfig { key: key.to_string(), reason: format!("expected a string, got {}", other) }),
        }
    }

    /// Insert a fallback loader at `position` (default: last).
    pub fn add_table_loader(&mut self, loader: Arc<dyn TableLoader>, position: Option<usize>) {
        let at = position.unwrap_or(self.loaders.len()).min(self.loaders.len());
        self.loaders.insert(at, loader);
    }

    pub fn clear_table_loaders(&mut self) { self.loaders.clear(); }

    pub fn loader_count(&self) -> usize { self.loaders.len() }

    /// Register a `DirectoryLoader` for the path configured under `key`, if any.
    pub fn register_source_root(&mut self, key: &str) -> Result<()> {
        if let Some(root) = self.config_str(key)? {
            debug!(target: "framequery::context", "{} = {}: registering directory loader", key, root);
            self.add_table_loader(Arc::new(DirectoryLoader::new(root)), None);
        }
        Ok(())
    }

    /// Make `engine` active and run its initialization hook against this context.
    pub fn select_engine(&mut self, engine: Arc<dyn Engine>) -> Result<()> {
        self.engine = engine.clone();
        engine.initialize(self)
    }

    pub fn register_function(&mut self, name: &str, udf: Arc<dyn ScalarUdf>) {
        self.functions.register(name, udf);
    }
}
