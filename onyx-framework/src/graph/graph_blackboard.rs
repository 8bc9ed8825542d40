//! Type-keyed scratch storage shared by all passes in one graph execution.
//!
//! Holds the "ambient" per-frame values many passes need (camera matrices,
//! global descriptor handles) without threading them through every builder
//! call. At most one value of any given type may exist — this is a singleton
//! per frame, not a multi-value container.

use downcast_rs::Downcast;
use fnv::FnvHashMap;
use std::any::TypeId;

/// Anything stored in the blackboard must implement this trait. There is a
/// blanket implementation for all compatible types.
pub trait BlackboardEntry: Downcast + Send + Sync {}

impl<T> BlackboardEntry for T where T: Downcast + Send + Sync {}

downcast_rs::impl_downcast!(BlackboardEntry);

#[derive(Default)]
pub struct RenderGraphBlackboard {
    entries: FnvHashMap<TypeId, Box<dyn BlackboardEntry>>,
}

impl RenderGraphBlackboard {
    pub fn new() -> Self {
        Default::default()
    }

    /// Store a value, keyed by its type. Returns a mutable reference so the
    /// caller can finish initializing in place.
    ///
    /// Panics if an entry of the same type already exists; the check happens
    /// at insertion so a duplicate cannot shadow the value earlier passes
    /// already read.
    pub fn add<T: BlackboardEntry>(
        &mut self,
        value: T,
    ) -> &mut T {
        let type_id = TypeId::of::<T>();
        if self.entries.contains_key(&type_id) {
            panic!(
                "Blackboard already contains an entry of type {}",
                core::any::type_name::<T>()
            );
        }

        self.entries.insert(type_id, Box::new(value));
        self.entries
            .get_mut(&type_id)
            .and_then(|e| e.downcast_mut::<T>())
            .unwrap()
    }

    /// Returns None if no entry of this type exists.
    pub fn try_get<T: BlackboardEntry>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .map(|e| e.downcast_ref::<T>().unwrap())
    }

    /// Fetch an entry the caller knows must exist. Panics if it doesn't; use
    /// [`try_get`](Self::try_get) when unsure.
    pub fn get<T: BlackboardEntry>(&self) -> &T {
        match self.try_get() {
            Some(value) => value,
            None => panic!(
                "Blackboard entry not found: {}",
                core::any::type_name::<T>()
            ),
        }
    }

    /// Drop every entry. Called between independent graph instances, never
    /// mid-build.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
