use indexmap::IndexMap;
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

use crate::{Ast, Bindings, EditorConfig};


#[derive(Debug, Display, FromStr, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    #[default]
    Const,
    Range,
}

/// Settings of one free variable.
///
/// `min` and `max` are kept while the kind is `Const`, so switching back to `Range`
/// restores the previous bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VariableSettings {
    pub kind: VariableKind,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl VariableSettings {
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
    pub fn range(value: f64, min: f64, max: f64) -> Self {
        Self {
            kind: VariableKind::Range,
            value,
            min,
            max,
        }
    }

    pub fn apply(&self, patch: &ContextPatch) -> Self {
        Self {
            kind: patch.kind.unwrap_or(self.kind),
            value: patch.value.unwrap_or(self.value),
            min: patch.min.unwrap_or(self.min),
            max: patch.max.unwrap_or(self.max),
        }
    }
}
impl Default for VariableSettings {
    fn default() -> Self {
        Self {
            kind: VariableKind::Const,
            value: 1.0,
            min: 0.0,
            max: 10.0,
        }
    }
}

/// `NaN` is equal to `NaN`, so that an unchanged malformed value does not count as a change.
impl PartialEq for VariableSettings {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && same_number(self.value, other.value)
            && same_number(self.min, other.min)
            && same_number(self.max, other.max)
    }
}

fn same_number(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Partial update of a [`VariableSettings`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContextPatch {
    pub kind: Option<VariableKind>,
    pub value: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}
impl ContextPatch {
    pub fn kind(kind: VariableKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
    pub fn value(value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }
    pub fn bounds(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }
}

/// Settings of the free variables of an expression, in order of first reference.
pub type VariableContext = IndexMap<String, VariableSettings>;

/// Every variable setting seen so far.
///
/// Entries are added or updated, never removed.
#[derive(Debug, Clone, Default)]
pub struct ContextCache(VariableContext);

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, name: &str) -> Option<&VariableSettings> {
        self.0.get(name)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn remember(&mut self, context: &VariableContext) {
        self.0
            .extend(context.iter().map(|(name, settings)| (name.clone(), *settings)));
    }
}

/// Free variables of `ast` with their settings.
///
/// Each name keeps its settings from `previous`, then from `cache`, and otherwise gets
/// `config.default_variable`. Reserved names are skipped.
pub fn derive_context(
    ast: Option<&Ast>,
    previous: &VariableContext,
    cache: &ContextCache,
    config: &EditorConfig,
) -> VariableContext {
    let mut context = VariableContext::new();
    let Some(ast) = ast else {
        return context;
    };
    for name in ast.walk().filter_map(Ast::name) {
        if context.contains_key(name) || config.is_reserved(name) {
            continue;
        }
        let settings = previous
            .get(name)
            .or_else(|| cache.get(name))
            .copied()
            .unwrap_or(config.default_variable);
        context.insert(name.to_string(), settings);
    }
    context
}

/// Same names with equal settings, in any order.
pub fn shallow_eq(a: &VariableContext, b: &VariableContext) -> bool {
    a.len() == b.len() && a.iter().all(|(name, settings)| b.get(name) == Some(settings))
}

/// Current value of every variable.
pub fn bindings(context: &VariableContext) -> Bindings {
    context
        .iter()
        .map(|(name, settings)| (name.clone(), settings.value))
        .collect()
}
