//! Hierarchical registry binding routable objects to composite names.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use shared::Name;

use crate::error::NamingError;

pub type Bound = Arc<dyn Any + Send + Sync>;

pub const CONSTANT: &str = "constant";
pub const OBJECT: &str = "object";
pub const ADMIN: &str = "admin";
pub const MODEL_CONTEXT: &str = "model_context";
pub const MODEL_RUN: &str = "model_run";
pub const CRUD_ACTION: &str = "crud_action";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Mutable,
    /// Accepts new bindings, refuses rebind and unbind.
    Immutable,
    /// Inline values; names resolve without registry slots.
    Constant,
    /// Objects keyed by identity, held weakly.
    Object,
}

enum Slot {
    Object(Bound),
    Context(Arc<NamingContext>),
}

#[derive(Default)]
struct Bindings {
    objects: HashMap<String, Bound>,
    weak_objects: HashMap<String, Weak<dyn Any + Send + Sync>>,
    contexts: HashMap<String, Arc<NamingContext>>,
}

pub struct NamingContext {
    kind: ContextKind,
    name: OnceLock<Name>,
    bindings: RwLock<Bindings>,
}

static INITIAL_NAMING_CONTEXT: OnceLock<Arc<NamingContext>> = OnceLock::new();

/// The process-wide root, shared by the UI thread and the worker.
pub fn initial_naming_context() -> Arc<NamingContext> {
    INITIAL_NAMING_CONTEXT
        .get_or_init(NamingContext::initial)
        .clone()
}

impl std::fmt::Debug for NamingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamingContext")
            .field("kind", &self.kind)
            .field("name", &self.name.get())
            .finish()
    }
}

impl NamingContext {
    pub fn new() -> Arc<Self> {
        Self::with_kind(ContextKind::Mutable)
    }

    pub fn immutable() -> Arc<Self> {
        Self::with_kind(ContextKind::Immutable)
    }

    pub fn with_kind(kind: ContextKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            name: OnceLock::new(),
            bindings: RwLock::new(Bindings::default()),
        })
    }

    /// A fresh root named `()` carrying the conventional subcontexts.
    pub fn initial() -> Arc<Self> {
        let root = Self::new();
        let _ = root.name.set(Name::root());
        let standard = [
            (CONSTANT, ContextKind::Constant),
            (OBJECT, ContextKind::Object),
            (ADMIN, ContextKind::Mutable),
            (MODEL_CONTEXT, ContextKind::Mutable),
            (MODEL_RUN, ContextKind::Mutable),
            (CRUD_ACTION, ContextKind::Immutable),
        ];
        for (segment, kind) in standard {
            let child = Self::with_kind(kind);
            if let Err(err) = root.bind_context(&Name::from([segment]), child) {
                tracing::error!(%segment, "failed to prepare initial naming context: {err}");
            }
        }
        root
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Full name of this context, frozen when it was bound.
    pub fn name(&self) -> Result<&Name, NamingError> {
        self.name.get().ok_or(NamingError::Unbound)
    }

    pub fn is_bound(&self) -> bool {
        self.name.get().is_some()
    }

    pub fn qualified_name(&self, segment: &str) -> Result<Name, NamingError> {
        Ok(self.name()?.child(segment))
    }

    pub fn bind(&self, name: &Name, obj: Bound) -> Result<Name, NamingError> {
        self.assign(name.segments(), Slot::Object(obj), false)
    }

    pub fn rebind(&self, name: &Name, obj: Bound) -> Result<Name, NamingError> {
        self.assign(name.segments(), Slot::Object(obj), true)
    }

    pub fn bind_context(&self, name: &Name, ctx: Arc<NamingContext>) -> Result<Name, NamingError> {
        self.assign(name.segments(), Slot::Context(ctx), false)
    }

    pub fn rebind_context(
        &self,
        name: &Name,
        ctx: Arc<NamingContext>,
    ) -> Result<Name, NamingError> {
        self.assign(name.segments(), Slot::Context(ctx), true)
    }

    pub fn bind_new_context(
        &self,
        name: &Name,
        kind: ContextKind,
    ) -> Result<Arc<NamingContext>, NamingError> {
        let ctx = Self::with_kind(kind);
        self.bind_context(name, ctx.clone())?;
        Ok(ctx)
    }

    pub fn unbind(&self, name: &Name) -> Result<(), NamingError> {
        self.remove(name.segments(), false)
    }

    pub fn unbind_context(&self, name: &Name) -> Result<(), NamingError> {
        self.remove(name.segments(), true)
    }

    pub fn resolve(&self, name: &Name) -> Result<Bound, NamingError> {
        validate(name.segments())?;
        self.with_leaf(name.segments(), |ctx, leaf| ctx.resolve_leaf(leaf))
    }

    pub fn resolve_context(&self, name: &Name) -> Result<Arc<NamingContext>, NamingError> {
        validate(name.segments())?;
        self.with_leaf(name.segments(), |ctx, leaf| {
            let bindings = ctx.read();
            if let Some(child) = bindings.contexts.get(leaf) {
                return Ok(child.clone());
            }
            if bindings.objects.contains_key(leaf)
                || bindings.weak_objects.contains_key(leaf)
                || ctx.kind == ContextKind::Constant
            {
                return Err(NamingError::ContextExpected(ctx.full_name(&[leaf])));
            }
            Err(NamingError::NameNotFound(ctx.full_name(&[leaf])))
        })
    }

    /// Resolve and downcast, failing with `InvalidBindingType` on mismatch.
    pub fn resolve_as<T: Any + Send + Sync>(&self, name: &Name) -> Result<Arc<T>, NamingError> {
        self.resolve(name)?
            .downcast::<T>()
            .map_err(|_| NamingError::InvalidBindingType(name.clone()))
    }

    /// Bind `obj` weakly under its identity key; binding twice is harmless.
    pub fn bind_weak(&self, key: &str, obj: &Bound) -> Result<Name, NamingError> {
        if self.kind != ContextKind::Object {
            return Err(NamingError::InvalidBindingType(self.full_name(&[key])));
        }
        validate(&[key.to_string()])?;
        let qualified = self.qualified_name(key)?;
        self.write()
            .weak_objects
            .insert(key.to_string(), Arc::downgrade(obj));
        Ok(qualified)
    }

    /// Inline name for a constant value, valid only on the constant context.
    pub fn bind_value(&self, value: &serde_json::Value) -> Result<Name, NamingError> {
        if self.kind != ContextKind::Constant {
            return Err(NamingError::InvalidBindingType(self.full_name(&[])));
        }
        Ok(self.name()?.child(encode_constant(value)))
    }

    /// Names of direct bindings, contexts included.
    pub fn list(&self) -> Vec<String> {
        let bindings = self.read();
        let mut names: Vec<String> = bindings
            .objects
            .keys()
            .chain(bindings.contexts.keys())
            .chain(bindings.weak_objects.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn assign(&self, segments: &[String], slot: Slot, rebind: bool) -> Result<Name, NamingError> {
        validate(segments)?;
        self.with_leaf(segments, move |ctx, leaf| ctx.assign_leaf(leaf, slot, rebind))
    }

    fn assign_leaf(&self, leaf: &str, slot: Slot, rebind: bool) -> Result<Name, NamingError> {
        match self.kind {
            ContextKind::Constant | ContextKind::Object => {
                return Err(NamingError::Immutable(self.full_name(&[])));
            }
            ContextKind::Immutable if rebind => {
                return Err(NamingError::Immutable(self.full_name(&[])));
            }
            _ => {}
        }
        let qualified = self.qualified_name(leaf)?;
        let mut bindings = self.write();
        match slot {
            Slot::Object(obj) => {
                if bindings.contexts.contains_key(leaf)
                    || (!rebind && bindings.objects.contains_key(leaf))
                {
                    return Err(NamingError::AlreadyBound(qualified));
                }
                bindings.objects.insert(leaf.to_string(), obj);
            }
            Slot::Context(ctx) => {
                if bindings.objects.contains_key(leaf)
                    || (!rebind && bindings.contexts.contains_key(leaf))
                {
                    return Err(NamingError::AlreadyBound(qualified));
                }
                if ctx.name.set(qualified.clone()).is_err() {
                    let existing = ctx.name.get().cloned().unwrap_or_default();
                    return Err(NamingError::AlreadyBound(existing));
                }
                bindings.contexts.insert(leaf.to_string(), ctx);
            }
        }
        tracing::trace!(name = %qualified, "bound");
        Ok(qualified)
    }

    fn remove(&self, segments: &[String], context: bool) -> Result<(), NamingError> {
        validate(segments)?;
        self.with_leaf(segments, |ctx, leaf| {
            match ctx.kind {
                ContextKind::Mutable | ContextKind::Object => {}
                _ => return Err(NamingError::Immutable(ctx.full_name(&[]))),
            }
            let mut bindings = ctx.write();
            let removed = if context {
                bindings.contexts.remove(leaf).is_some()
            } else {
                bindings.objects.remove(leaf).is_some()
                    || bindings.weak_objects.remove(leaf).is_some()
            };
            if removed {
                Ok(())
            } else {
                Err(NamingError::NameNotFound(ctx.full_name(&[leaf])))
            }
        })
    }

    fn resolve_leaf(&self, leaf: &str) -> Result<Bound, NamingError> {
        if self.kind == ContextKind::Constant {
            return decode_constant(leaf)
                .map(|value| Arc::new(value) as Bound)
                .ok_or_else(|| NamingError::NameNotFound(self.full_name(&[leaf])));
        }
        let bindings = self.read();
        if let Some(obj) = bindings.objects.get(leaf) {
            return Ok(obj.clone());
        }
        if let Some(ctx) = bindings.contexts.get(leaf) {
            return Ok(ctx.clone() as Bound);
        }
        if let Some(obj) = bindings.weak_objects.get(leaf).and_then(Weak::upgrade) {
            return Ok(obj);
        }
        Err(NamingError::NameNotFound(self.full_name(&[leaf])))
    }

    /// Descend through child contexts and run `f` on the context owning the last segment.
    fn with_leaf<R>(
        &self,
        segments: &[String],
        f: impl FnOnce(&NamingContext, &str) -> Result<R, NamingError>,
    ) -> Result<R, NamingError> {
        match segments {
            [] => Err(NamingError::InvalidName(Vec::new())),
            [leaf] => f(self, leaf),
            [first, rest @ ..] => {
                let child = self.read().contexts.get(first).cloned();
                match child {
                    Some(child) => child.with_leaf(rest, f),
                    None => Err(NamingError::NameNotFound(self.full_name(&[first]))),
                }
            }
        }
    }

    fn full_name(&self, tail: &[&str]) -> Name {
        let base = self.name.get().cloned().unwrap_or_default();
        base.join(tail.iter().copied())
    }

    fn read(&self) -> RwLockReadGuard<'_, Bindings> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Bindings> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(segments: &[String]) -> Result<(), NamingError> {
    if segments.is_empty() || segments.iter().any(|segment| segment.is_empty()) {
        return Err(NamingError::InvalidName(segments.to_vec()));
    }
    Ok(())
}

pub fn encode_constant(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(true) => "true".to_string(),
        serde_json::Value::Bool(false) => "false".to_string(),
        other => URL_SAFE_NO_PAD.encode(other.to_string()),
    }
}

pub fn decode_constant(segment: &str) -> Option<serde_json::Value> {
    match segment {
        "null" => Some(serde_json::Value::Null),
        "true" => Some(serde_json::Value::Bool(true)),
        "false" => Some(serde_json::Value::Bool(false)),
        other => {
            let raw = URL_SAFE_NO_PAD.decode(other).ok()?;
            serde_json::from_slice(&raw).ok()
        }
    }
}

/// Inline constant name for `value`, without touching any registry.
pub fn constant_name(value: &serde_json::Value) -> Name {
    Name::from([CONSTANT]).child(encode_constant(value))
}

#[cfg(test)]
#[path = "tests/naming_tests.rs"]
mod tests;
