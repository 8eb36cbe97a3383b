use serde::de::DeserializeOwned;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use tracing::debug;
use vpack::{ErrorKind, Slice};

use crate::de::from_slice;
use crate::error::Result;

type DeserializeFn<T> = dyn Fn(Slice<'_>) -> Result<T> + Send + Sync;

/// Deserializers keyed by the type they produce. Used for response shapes which differ from the
/// serde representation of a type, like an entity wrapped into an envelope object.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<TypeId, (&'static str, Box<dyn Any + Send + Sync>)>,
}

impl Registry {

    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the deserializer for `T`, replacing any earlier one
    pub fn register<T, F>(&mut self, deserialize: F) -> &mut Self
    where
        T: 'static,
        F: Fn(Slice<'_>) -> Result<T> + Send + Sync + 'static,
    {
        debug!(ty = type_name::<T>(), "registering deserializer");
        let deserialize: Box<DeserializeFn<T>> = Box::new(deserialize);
        self.entries.insert(TypeId::of::<T>(), (type_name::<T>(), Box::new(deserialize)));
        self
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    fn lookup<T: 'static>(&self) -> Option<&DeserializeFn<T>> {
        self.entries.get(&TypeId::of::<T>())
            .and_then(|(_, entry)| entry.downcast_ref::<Box<DeserializeFn<T>>>())
            .map(|deserialize| deserialize.as_ref())
    }

    /// Uses the registered deserializer for `T`, or serde if there is none
    pub fn deserialize<T: DeserializeOwned + 'static>(&self, slice: Slice<'_>) -> Result<T> {
        match self.lookup::<T>() {
            Some(deserialize) => {
                debug!(ty = type_name::<T>(), "dispatching to registered deserializer");
                deserialize(slice)
            },
            None => from_slice(slice),
        }
    }

    /// Like [`Registry::deserialize`] for types which only have a registered deserializer
    pub fn deserialize_registered<T: 'static>(&self, slice: Slice<'_>) -> Result<T> {
        match self.lookup::<T>() {
            Some(deserialize) => deserialize(slice),
            None => Err(ErrorKind::DeserializationFailure(format!("no deserializer registered for {}", type_name::<T>())).into()),
        }
    }

}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.entries.values().map(|(name, _)| *name).collect();
        types.sort_unstable();
        f.debug_struct("Registry").field("types", &types).finish()
    }
}
