//! State schemas and reducers - how node outputs become shared state
//!
//! Every graph owns a [`StateSchema`]: a strategy object that produces the
//! initial state of a fresh run and merges node outputs (and parallel-branch
//! deltas) into the current state. Two flavors ship with the engine:
//!
//! - [`MapSchema`] - map-shaped state with per-key [`Reducer`]s. Keys without
//!   a registered reducer overwrite; keys missing from an update are
//!   preserved. This is the loose, dynamic flavor and the default.
//! - [`StructSchema`] - a single whole-state merger closure, for callers who
//!   treat the JSON value as a typed struct and want full control.
//!
//! # Built-in Reducers
//!
//! | Reducer | Behavior |
//! |---------|----------|
//! | [`OverwriteReducer`] | use the new value when present, else keep current |
//! | [`AppendReducer`] | ordered sequence concat, duplicates preserved |
//! | [`FnReducer`] | caller-supplied pure binary function |
//!
//! # Parallel Fan-in
//!
//! When a step runs several nodes, the engine merges their deltas in
//! lexicographic order of the source node names before the next step begins.
//! Custom reducers are trusted to be associative with respect to that order;
//! `append` and `overwrite` are.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::state::{AppendReducer, MapSchema, StateSchema};
//! use serde_json::json;
//!
//! let mut schema = MapSchema::new();
//! schema.add_field("tags", Box::new(AppendReducer));
//!
//! let state = json!({"tags": ["initial"], "status": "draft"});
//! let merged = schema.update(state, &json!({"tags": ["go"], "status": "ok"})).unwrap();
//!
//! assert_eq!(merged["tags"], json!(["initial", "go"])); // appended
//! assert_eq!(merged["status"], json!("ok"));            // default overwrite
//! ```

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while merging state
#[derive(Error, Debug)]
pub enum StateError {
    /// A reducer rejected the pair of values it was given
    #[error("reducer '{reducer}' failed on key '{key}': {message}")]
    ReducerFailed {
        /// Name of the failing reducer
        reducer: String,
        /// State key being merged ("*" for whole-state mergers)
        key: String,
        /// Reducer-supplied description
        message: String,
    },

    /// The schema required an object-shaped value and got something else
    #[error("expected a JSON object for {context}, got {found}")]
    NotAnObject {
        /// Which value was malformed
        context: &'static str,
        /// JSON type actually found
        found: &'static str,
    },
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Per-key merge strategy for [`MapSchema`]
///
/// Reducers must be pure and associative with respect to the engine's
/// lexicographic merge order for parallel branches.
pub trait Reducer: Send + Sync {
    /// Merge `update` into `current`, returning the new value
    ///
    /// `current` is `Null` when the key is absent from the state.
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value, StateError>;

    /// Human-readable name, used in error messages
    fn name(&self) -> &str;
}

/// Keep the new value when present, else keep the current one
///
/// "Present" means non-null: a `null` update leaves the current value
/// untouched, anything else replaces it wholesale.
#[derive(Debug, Clone)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value, StateError> {
        if update.is_null() {
            Ok(current.clone())
        } else {
            Ok(update.clone())
        }
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Ordered sequence concatenation, duplicates preserved
///
/// - array + array: concatenated in order
/// - array + scalar: scalar pushed as a single element
/// - null + anything: initialized as an array
#[derive(Debug, Clone)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value, StateError> {
        match (current, update) {
            (Value::Array(curr), Value::Array(upd)) => {
                let mut merged = curr.clone();
                merged.extend_from_slice(upd);
                Ok(Value::Array(merged))
            }
            (Value::Null, Value::Array(upd)) => Ok(Value::Array(upd.clone())),
            (Value::Array(curr), single) => {
                let mut merged = curr.clone();
                merged.push(single.clone());
                Ok(Value::Array(merged))
            }
            (Value::Null, single) => Ok(Value::Array(vec![single.clone()])),
            (other, _) => Err(StateError::ReducerFailed {
                reducer: self.name().to_string(),
                key: String::new(),
                message: format!("current value is {}, expected array or null", json_type(other)),
            }),
        }
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Caller-supplied pure binary reducer
///
/// ```rust
/// use flowgraph_core::state::{FnReducer, Reducer};
/// use serde_json::json;
///
/// let sum = FnReducer::new("sum", |current, update| {
///     Ok(json!(current.as_i64().unwrap_or(0) + update.as_i64().unwrap_or(0)))
/// });
/// assert_eq!(sum.reduce(&json!(2), &json!(3)).unwrap(), json!(5));
/// ```
#[derive(Clone)]
pub struct FnReducer {
    name: String,
    func: Arc<dyn Fn(&Value, &Value) -> Result<Value, StateError> + Send + Sync>,
}

impl FnReducer {
    /// Wrap a closure as a named reducer
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Value, &Value) -> Result<Value, StateError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl Reducer for FnReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value, StateError> {
        (self.func)(current, update)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FnReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnReducer")
            .field("name", &self.name)
            .field("func", &"<function>")
            .finish()
    }
}

/// Pluggable state-merge strategy owned by a compiled graph
pub trait StateSchema: Send + Sync {
    /// Produce the initial state of a fresh run when the caller passes none
    fn init(&self) -> Value {
        Value::Object(Map::new())
    }

    /// Merge an update into the current state
    ///
    /// Invoked for each node output within a step (pre-sorted by node name
    /// for parallel branches) and for resumed-state application.
    fn update(&self, current: Value, update: &Value) -> Result<Value, StateError>;

    /// End-of-run hook for dropping transient fields; identity by default
    fn cleanup(&self, state: Value) -> Value {
        state
    }
}

/// Map-shaped schema: per-key reducers over a JSON object state
///
/// Keys with a registered reducer use it; keys without one overwrite (null
/// updates preserved per [`OverwriteReducer`] semantics); keys absent from an
/// update are left untouched. A non-object update or state falls back to
/// wholesale overwrite, so opaque states still flow through.
pub struct MapSchema {
    reducers: HashMap<String, Box<dyn Reducer>>,
    initial: Value,
    transient_keys: Vec<String>,
}

impl MapSchema {
    /// Create a schema with no registered reducers (pure overwrite map)
    pub fn new() -> Self {
        Self {
            reducers: HashMap::new(),
            initial: Value::Object(Map::new()),
            transient_keys: Vec::new(),
        }
    }

    /// Register a reducer for one key
    pub fn add_field(&mut self, key: impl Into<String>, reducer: Box<dyn Reducer>) -> &mut Self {
        self.reducers.insert(key.into(), reducer);
        self
    }

    /// Chainable form of [`add_field`](Self::add_field)
    pub fn with_field(mut self, key: impl Into<String>, reducer: Box<dyn Reducer>) -> Self {
        self.reducers.insert(key.into(), reducer);
        self
    }

    /// Set the state returned by [`init`](StateSchema::init)
    pub fn with_initial(mut self, initial: Value) -> Self {
        self.initial = initial;
        self
    }

    /// Mark keys to drop at end-of-run ("cleaning" variant)
    ///
    /// [`cleanup`](StateSchema::cleanup) removes these keys from the final
    /// state, which is how scratch fields written by intermediate nodes stay
    /// out of the caller-visible result.
    pub fn with_transient_keys(mut self, keys: Vec<String>) -> Self {
        self.transient_keys = keys;
        self
    }
}

impl Default for MapSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MapSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<(&str, &str)> = self
            .reducers
            .iter()
            .map(|(key, reducer)| (key.as_str(), reducer.name()))
            .collect();
        fields.sort_unstable();
        f.debug_struct("MapSchema")
            .field("reducers", &fields)
            .field("transient_keys", &self.transient_keys)
            .finish()
    }
}

impl StateSchema for MapSchema {
    fn init(&self) -> Value {
        self.initial.clone()
    }

    fn update(&self, current: Value, update: &Value) -> Result<Value, StateError> {
        if update.is_null() {
            return Ok(current);
        }
        let Value::Object(upd) = update else {
            // Opaque (non-map) states overwrite wholesale.
            return Ok(update.clone());
        };
        let mut state = match current {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(StateError::NotAnObject {
                    context: "current state",
                    found: json_type(&other),
                })
            }
        };

        for (key, new_value) in upd {
            let existing = state.get(key).cloned().unwrap_or(Value::Null);
            let merged = match self.reducers.get(key) {
                Some(reducer) => {
                    reducer
                        .reduce(&existing, new_value)
                        .map_err(|err| match err {
                            StateError::ReducerFailed {
                                reducer, message, ..
                            } => StateError::ReducerFailed {
                                reducer,
                                key: key.clone(),
                                message,
                            },
                            other => other,
                        })?
                }
                None => OverwriteReducer.reduce(&existing, new_value)?,
            };
            state.insert(key.clone(), merged);
        }
        Ok(Value::Object(state))
    }

    fn cleanup(&self, state: Value) -> Value {
        if self.transient_keys.is_empty() {
            return state;
        }
        match state {
            Value::Object(mut map) => {
                for key in &self.transient_keys {
                    map.remove(key);
                }
                Value::Object(map)
            }
            other => other,
        }
    }
}

/// Whole-state merge closure type used by [`StructSchema`]
pub type MergeFn = Arc<dyn Fn(Value, &Value) -> Result<Value, StateError> + Send + Sync>;

/// Struct-shaped schema: one whole-state merger
///
/// For callers who model state as a typed struct serialized to JSON and want
/// a single merge function instead of per-key reducers.
///
/// ```rust
/// use flowgraph_core::state::{StateSchema, StructSchema};
/// use serde_json::json;
///
/// let schema = StructSchema::new(
///     || json!({"log": []}),
///     |mut current, update| {
///         if let Some(entry) = update.get("log_entry") {
///             current["log"].as_array_mut().unwrap().push(entry.clone());
///         }
///         Ok(current)
///     },
/// );
///
/// let merged = schema
///     .update(schema.init(), &json!({"log_entry": "started"}))
///     .unwrap();
/// assert_eq!(merged["log"], json!(["started"]));
/// ```
pub struct StructSchema {
    init_fn: Arc<dyn Fn() -> Value + Send + Sync>,
    merge_fn: MergeFn,
    cleanup_fn: Option<Arc<dyn Fn(Value) -> Value + Send + Sync>>,
}

impl StructSchema {
    /// Build from an initializer and a whole-state merger
    pub fn new(
        init: impl Fn() -> Value + Send + Sync + 'static,
        merge: impl Fn(Value, &Value) -> Result<Value, StateError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            init_fn: Arc::new(init),
            merge_fn: Arc::new(merge),
            cleanup_fn: None,
        }
    }

    /// Attach an end-of-run cleanup transform
    pub fn with_cleanup(mut self, cleanup: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.cleanup_fn = Some(Arc::new(cleanup));
        self
    }
}

impl fmt::Debug for StructSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructSchema")
            .field("merge", &"<function>")
            .field("cleanup", &self.cleanup_fn.as_ref().map(|_| "<function>"))
            .finish()
    }
}

impl StateSchema for StructSchema {
    fn init(&self) -> Value {
        (self.init_fn)()
    }

    fn update(&self, current: Value, update: &Value) -> Result<Value, StateError> {
        (self.merge_fn)(current, update)
    }

    fn cleanup(&self, state: Value) -> Value {
        match &self.cleanup_fn {
            Some(cleanup) => cleanup(state),
            None => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overwrite_keeps_current_on_null() {
        let reducer = OverwriteReducer;
        assert_eq!(
            reducer.reduce(&json!("old"), &json!("new")).unwrap(),
            json!("new")
        );
        assert_eq!(
            reducer.reduce(&json!("old"), &Value::Null).unwrap(),
            json!("old")
        );
    }

    #[test]
    fn test_append_concatenates_preserving_duplicates() {
        let reducer = AppendReducer;
        assert_eq!(
            reducer
                .reduce(&json!(["go", "lang"]), &json!(["ai", "go"]))
                .unwrap(),
            json!(["go", "lang", "ai", "go"])
        );
        assert_eq!(
            reducer.reduce(&Value::Null, &json!(["first"])).unwrap(),
            json!(["first"])
        );
        assert_eq!(
            reducer.reduce(&json!([1, 2]), &json!(3)).unwrap(),
            json!([1, 2, 3])
        );
    }

    #[test]
    fn test_append_rejects_non_sequence_current() {
        let err = AppendReducer.reduce(&json!("scalar"), &json!([1])).unwrap_err();
        assert!(matches!(err, StateError::ReducerFailed { .. }));
    }

    #[test]
    fn test_map_schema_preserves_missing_keys() {
        let schema = MapSchema::new();
        let merged = schema
            .update(json!({"input": "start", "a": "done"}), &json!({"b": "done"}))
            .unwrap();
        assert_eq!(
            merged,
            json!({"input": "start", "a": "done", "b": "done"})
        );
    }

    #[test]
    fn test_map_schema_routes_keys_to_reducers() {
        let schema = MapSchema::new().with_field("tags", Box::new(AppendReducer));
        let merged = schema
            .update(
                json!({"tags": ["initial"], "status": "draft"}),
                &json!({"tags": ["go"], "status": "final"}),
            )
            .unwrap();
        assert_eq!(merged["tags"], json!(["initial", "go"]));
        assert_eq!(merged["status"], json!("final"));
    }

    #[test]
    fn test_map_schema_reducer_failure_names_the_key() {
        let schema = MapSchema::new().with_field("tags", Box::new(AppendReducer));
        let err = schema
            .update(json!({"tags": "oops"}), &json!({"tags": ["x"]}))
            .unwrap_err();
        match err {
            StateError::ReducerFailed { key, reducer, .. } => {
                assert_eq!(key, "tags");
                assert_eq!(reducer, "append");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_map_schema_cleanup_drops_transient_keys() {
        let schema = MapSchema::new().with_transient_keys(vec!["scratch".to_string()]);
        let cleaned = schema.cleanup(json!({"scratch": 1, "result": 2}));
        assert_eq!(cleaned, json!({"result": 2}));
    }

    #[test]
    fn test_fn_reducer() {
        let sum = FnReducer::new("sum", |current, update| {
            Ok(json!(current.as_i64().unwrap_or(0) + update.as_i64().unwrap_or(0)))
        });
        let schema = MapSchema::new().with_field("total", Box::new(sum));
        let merged = schema
            .update(json!({"total": 40}), &json!({"total": 2}))
            .unwrap();
        assert_eq!(merged["total"], json!(42));
    }

    #[test]
    fn test_struct_schema_cleanup() {
        let schema = StructSchema::new(|| json!({}), |_, update| Ok(update.clone()))
            .with_cleanup(|mut state| {
                state.as_object_mut().map(|map| map.remove("temp"));
                state
            });
        let cleaned = schema.cleanup(json!({"temp": 1, "keep": 2}));
        assert_eq!(cleaned, json!({"keep": 2}));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn json_scalars() -> impl Strategy<Value = Value> {
            prop_oneof![
                any::<i64>().prop_map(|n| json!(n)),
                "[a-z]{0,8}".prop_map(|s| json!(s)),
                any::<bool>().prop_map(|b| json!(b)),
            ]
        }

        proptest! {
            #[test]
            fn append_preserves_order_and_length(
                left in prop::collection::vec(json_scalars(), 0..8),
                right in prop::collection::vec(json_scalars(), 0..8),
            ) {
                let merged = AppendReducer
                    .reduce(&Value::Array(left.clone()), &Value::Array(right.clone()))
                    .unwrap();
                let merged = merged.as_array().unwrap();
                prop_assert_eq!(merged.len(), left.len() + right.len());
                prop_assert_eq!(&merged[..left.len()], &left[..]);
                prop_assert_eq!(&merged[left.len()..], &right[..]);
            }

            #[test]
            fn overwrite_wins_for_present_values(current in json_scalars(), update in json_scalars()) {
                let merged = OverwriteReducer.reduce(&current, &update).unwrap();
                prop_assert_eq!(merged, update);
            }

            #[test]
            fn map_update_never_invents_keys(
                keys in prop::collection::hash_set("[a-z]{1,4}", 0..6),
            ) {
                let schema = MapSchema::new();
                let update: Value = Value::Object(
                    keys.iter().map(|k| (k.clone(), json!(1))).collect()
                );
                let merged = schema.update(json!({}), &update).unwrap();
                let merged_keys: std::collections::HashSet<String> =
                    merged.as_object().unwrap().keys().cloned().collect();
                prop_assert_eq!(merged_keys, keys);
            }
        }
    }
}
