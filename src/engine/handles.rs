// SPDX-License-Identifier: GPL-3.0-only

//! Reference-counted identity handles for host objects
//!
//! The host binding issues one [`InstanceHandle`] per camera object it sees
//! and one [`Target`] per rendering destination. The engine only ever keeps
//! the weak side ([`WeakInstance`], [`WeakTarget`]) so it can never be the
//! reason a host object stays alive.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // First block is enough to tell instances apart in logs
                let simple = self.0.simple().to_string();
                write!(f, "@{}", &simple[..8])
            }
        }
    };
}

id_type!(InstanceId);
id_type!(TargetId);
id_type!(TextureId);

#[derive(Debug)]
struct InstanceInner {
    id: InstanceId,
}

/// Identity of one live camera object in the host
#[derive(Debug, Clone)]
pub struct InstanceHandle(Arc<InstanceInner>);

impl InstanceHandle {
    pub fn new() -> Self {
        Self(Arc::new(InstanceInner {
            id: InstanceId::new(),
        }))
    }

    pub fn id(&self) -> InstanceId {
        self.0.id
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            id: self.0.id,
            inner: Arc::downgrade(&self.0),
        }
    }
}

impl Default for InstanceHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for InstanceHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InstanceHandle {}

/// Non-owning reference to a camera instance
#[derive(Debug, Clone)]
pub struct WeakInstance {
    id: InstanceId,
    inner: Weak<InstanceInner>,
}

impl WeakInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn upgrade(&self) -> Option<InstanceHandle> {
        self.inner.upgrade().map(InstanceHandle)
    }

    /// True while some host code still holds the instance
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub fn refers_to(&self, instance: &InstanceHandle) -> bool {
        self.id == instance.id()
    }
}

#[derive(Debug)]
struct TargetInner {
    id: TargetId,
    released: AtomicBool,
}

/// Opaque rendering destination owned by the host
#[derive(Debug, Clone)]
pub struct Target(Arc<TargetInner>);

impl Target {
    pub fn new() -> Self {
        Self(Arc::new(TargetInner {
            id: TargetId::new(),
            released: AtomicBool::new(false),
        }))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    /// False once the host released the destination
    pub fn is_valid(&self) -> bool {
        !self.0.released.load(Ordering::Acquire)
    }

    /// Mark the destination as released; all clones observe it
    pub fn release(&self) {
        self.0.released.store(true, Ordering::Release);
    }

    pub fn downgrade(&self) -> WeakTarget {
        WeakTarget {
            id: self.0.id,
            inner: Arc::downgrade(&self.0),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Target {}

/// Non-owning reference to a rendering destination
#[derive(Debug, Clone)]
pub struct WeakTarget {
    id: TargetId,
    inner: Weak<TargetInner>,
}

impl WeakTarget {
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Upgrade only if the target is both alive and not released
    pub fn upgrade(&self) -> Option<Target> {
        self.inner
            .upgrade()
            .map(Target)
            .filter(|target| target.is_valid())
    }

    pub fn is_valid(&self) -> bool {
        self.upgrade().is_some()
    }
}

#[derive(Debug)]
struct TextureInner {
    id: TextureId,
}

/// Texture-style destination that needs resolving into a [`Target`]
#[derive(Debug, Clone)]
pub struct TextureHandle(Arc<TextureInner>);

impl TextureHandle {
    pub fn new() -> Self {
        Self(Arc::new(TextureInner {
            id: TextureId::new(),
        }))
    }

    pub fn id(&self) -> TextureId {
        self.0.id
    }

    pub(crate) fn downgrade(&self) -> WeakTexture {
        WeakTexture(Arc::downgrade(&self.0))
    }
}

impl Default for TextureHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WeakTexture(Weak<TextureInner>);

impl WeakTexture {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
