use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::marker::PhantomData;

use cs_core::{ErrorKind, ScriptError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::persist::{RecordReader, RecordWriter};

/// Opaque index of a live object in a [`HandleStore`].
///
/// `T` only records which table the handle belongs to. `0` is never
/// assigned and stands for "no object".
#[repr(transparent)]
pub struct Handle<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub const INVALID: Self = Self::from_raw(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn raw(self) -> u32 {
        self.raw
    }

    pub const fn is_valid(self) -> bool {
        self.raw != 0
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.raw)
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<T> Serialize for Handle<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.raw)
    }
}

impl<'de, T> Deserialize<'de> for Handle<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_raw)
    }
}

struct StoreInner<T> {
    next: u32,
    objects: BTreeMap<u32, T>,
}

impl<T> StoreInner<T> {
    fn allocate(&mut self) -> u32 {
        loop {
            let candidate = self.next;
            self.next = if self.next == u32::MAX { 1 } else { self.next + 1 };
            if !self.objects.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

/// One table of objects of a single type, addressed by [`Handle`].
///
/// Every operation takes the table lock only for its own duration; callers
/// must not reach into another table from inside a `with`/`with_mut`
/// closure.
pub struct HandleStore<T> {
    kind: &'static str,
    inner: RwLock<StoreInner<T>>,
}

impl<T> HandleStore<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            inner: RwLock::new(StoreInner {
                next: 1,
                objects: BTreeMap::new(),
            }),
        }
    }

    pub fn create(&self, object: T) -> Handle<T> {
        let mut inner = self.inner.write();
        let raw = inner.allocate();
        inner.objects.insert(raw, object);
        Handle::from_raw(raw)
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.inner.read().objects.contains_key(&handle.raw)
    }

    pub fn with<R>(&self, handle: Handle<T>, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.read().objects.get(&handle.raw).map(f)
    }

    pub fn with_mut<R>(&self, handle: Handle<T>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.write().objects.get_mut(&handle.raw).map(f)
    }

    /// Removes the object; destroying an absent handle is a no-op.
    pub fn destroy(&self, handle: Handle<T>) -> Option<T> {
        self.inner.write().objects.remove(&handle.raw)
    }

    pub fn handles(&self) -> Vec<Handle<T>> {
        self.inner
            .read()
            .objects
            .keys()
            .map(|raw| Handle::from_raw(*raw))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<Handle<T>> {
        self.inner
            .read()
            .objects
            .iter()
            .find(|(_, object)| predicate(object))
            .map(|(raw, _)| Handle::from_raw(*raw))
    }

    /// Returns the first object matching `predicate`, or stores `make()`.
    /// The lookup and the insert share one write lock. The flag is `true`
    /// when the object was created.
    pub fn find_or_create(
        &self,
        mut predicate: impl FnMut(&T) -> bool,
        make: impl FnOnce() -> T,
    ) -> (Handle<T>, bool) {
        let mut inner = self.inner.write();
        if let Some(raw) = inner
            .objects
            .iter()
            .find(|(_, object)| predicate(object))
            .map(|(raw, _)| *raw)
        {
            return (Handle::from_raw(raw), false);
        }
        let raw = inner.allocate();
        inner.objects.insert(raw, make());
        (Handle::from_raw(raw), true)
    }

    /// Removes the object only while `predicate` holds for it.
    pub fn destroy_if(&self, handle: Handle<T>, predicate: impl FnOnce(&T) -> bool) -> Option<T> {
        let mut inner = self.inner.write();
        if !inner.objects.get(&handle.raw).map(predicate).unwrap_or(false) {
            return None;
        }
        inner.objects.remove(&handle.raw)
    }

    /// Applies `f` to objects in handle order until it returns `Some`, all
    /// under one write lock.
    pub fn update_first<R>(&self, mut f: impl FnMut(Handle<T>, &mut T) -> Option<R>) -> Option<R> {
        let mut inner = self.inner.write();
        inner
            .objects
            .iter_mut()
            .find_map(|(raw, object)| f(Handle::from_raw(*raw), object))
    }

    pub fn clear_all(&self) {
        let mut inner = self.inner.write();
        inner.objects.clear();
        inner.next = 1;
    }

    #[cfg(test)]
    pub(crate) fn set_next_raw(&self, raw: u32) {
        self.inner.write().next = raw;
    }
}

impl<T: Clone> HandleStore<T> {
    pub fn get(&self, handle: Handle<T>) -> Option<T> {
        self.with(handle, T::clone)
    }
}

impl<T: Serialize> HandleStore<T> {
    /// Writes `count` followed by `(handle, payload)` for every live object.
    pub fn save_all<W: Write>(&self, out: &mut RecordWriter<W>) -> Result<(), ScriptError> {
        let inner = self.inner.read();
        out.write_len(inner.objects.len())?;
        for (raw, object) in &inner.objects {
            out.write_u32(*raw)?;
            out.write_payload(object)?;
        }
        Ok(())
    }
}

impl<T: DeserializeOwned> HandleStore<T> {
    /// Replaces the table with the records read from `input`.
    ///
    /// Any undecodable record leaves the table empty: the rest of the stream
    /// cannot be trusted once one payload is off.
    pub fn load_all<R: Read>(&self, input: &mut RecordReader<R>) -> Result<usize, ScriptError> {
        self.clear_all();
        match self.read_records(input) {
            Ok(objects) => {
                let count = objects.len();
                let mut inner = self.inner.write();
                let max = objects.keys().next_back().copied().unwrap_or(0);
                inner.next = if max == u32::MAX { 1 } else { max + 1 };
                inner.objects = objects;
                Ok(count)
            }
            Err(error) => {
                log::error!("{} table failed to load: {}", self.kind, error);
                Err(error)
            }
        }
    }

    fn read_records<R: Read>(&self, input: &mut RecordReader<R>) -> Result<BTreeMap<u32, T>, ScriptError> {
        let count = input.read_u32()?;
        let mut objects = BTreeMap::new();
        for index in 0..count {
            let raw = input.read_u32()?;
            if raw == 0 || objects.contains_key(&raw) {
                return Err(ScriptError::new(
                    ErrorKind::CorruptSave,
                    format!(
                        "{} record {} carries invalid handle {}.",
                        self.kind, index, raw
                    ),
                ));
            }
            let object = input.read_payload::<T>().map_err(|error| {
                ScriptError::new(
                    ErrorKind::CorruptSave,
                    format!("{} record {} (handle {}): {}", self.kind, index, raw, error.message),
                )
            })?;
            objects.insert(raw, object);
        }
        Ok(objects)
    }
}
