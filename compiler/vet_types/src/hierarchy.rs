//! Registry of nominal types.
//!
//! Every class a value can report (built-in or user-defined) is registered
//! here by name with its ordered parents. Subtyping is reachability through
//! the parent edges. A class may also carry a subclass hook that overrides the
//! walk when it has an opinion.
//!
//! The registry is shared behind a `RwLock`: lookups vastly outnumber
//! registrations, which usually happen once at start-up.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use vet_ir::{well_known, Descriptor, Name};

/// A custom subclass check.
///
/// Called with the other side of a comparison. `None` means the hook has no
/// opinion and the hierarchy walk decides.
pub type SubclassHook = Arc<dyn Fn(&Descriptor) -> Option<bool> + Send + Sync>;

/// Errors raised while registering classes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("class `{name}` is already registered")]
    AlreadyRegistered { name: Name },

    #[error("class `{name}` names unknown parent `{parent}`")]
    UnknownParent { name: Name, parent: Name },
}

struct ClassEntry {
    parents: Vec<Name>,
    hook: Option<SubclassHook>,
}

/// Nominal type registry.
pub struct Hierarchy {
    classes: RwLock<FxHashMap<Name, ClassEntry>>,
}

static GLOBAL: Lazy<Arc<Hierarchy>> = Lazy::new(|| Arc::new(Hierarchy::with_builtins()));

impl Hierarchy {
    /// A registry with nothing in it, not even `object`.
    pub fn empty() -> Self {
        Hierarchy {
            classes: RwLock::new(FxHashMap::default()),
        }
    }

    /// A registry seeded with the built-in numeric tower and containers.
    pub fn with_builtins() -> Self {
        let mut classes = FxHashMap::default();
        for (name, parents) in well_known::BUILTIN_PARENTS {
            classes.insert(
                Name::new(name),
                ClassEntry {
                    parents: parents.iter().map(Name::new).collect(),
                    hook: None,
                },
            );
        }
        Hierarchy {
            classes: RwLock::new(classes),
        }
    }

    /// The process-wide default registry.
    pub fn global() -> Arc<Hierarchy> {
        Arc::clone(&GLOBAL)
    }

    /// Register `name` below `parents`. An empty parent list puts the class
    /// directly under `object` when `object` is registered.
    pub fn register(
        &self,
        name: impl Into<Name>,
        parents: impl IntoIterator<Item = Name>,
    ) -> Result<(), HierarchyError> {
        self.insert(name.into(), parents.into_iter().collect(), None)
    }

    /// Register `name` with a subclass hook.
    pub fn register_with_hook(
        &self,
        name: impl Into<Name>,
        parents: impl IntoIterator<Item = Name>,
        hook: SubclassHook,
    ) -> Result<(), HierarchyError> {
        self.insert(name.into(), parents.into_iter().collect(), Some(hook))
    }

    fn insert(
        &self,
        name: Name,
        mut parents: Vec<Name>,
        hook: Option<SubclassHook>,
    ) -> Result<(), HierarchyError> {
        let mut classes = self.classes.write();
        if classes.contains_key(&name) {
            return Err(HierarchyError::AlreadyRegistered { name });
        }
        if let Some(parent) = parents.iter().find(|p| !classes.contains_key(*p)) {
            return Err(HierarchyError::UnknownParent {
                name,
                parent: parent.clone(),
            });
        }
        if parents.is_empty() && classes.contains_key(well_known::OBJECT) {
            parents.push(Name::new(well_known::OBJECT));
        }
        tracing::debug!(class = %name, parents = ?parents, "registered class");
        classes.insert(name, ClassEntry { parents, hook });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    /// The subclass hook registered for `name`, if any.
    pub fn hook(&self, name: &str) -> Option<SubclassHook> {
        self.classes
            .read()
            .get(name)
            .and_then(|entry| entry.hook.clone())
    }

    /// Whether `ancestor` is `child` or reachable from it through parents.
    ///
    /// Unregistered names have no parents, so they are only subclasses of
    /// themselves.
    pub fn is_subclass(&self, child: &str, ancestor: &str) -> bool {
        if child == ancestor {
            return true;
        }
        let classes = self.classes.read();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut pending: SmallVec<[&str; 8]> = SmallVec::new();
        pending.push(child);
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(entry) = classes.get(current) else {
                continue;
            };
            for parent in &entry.parents {
                if parent.as_str() == ancestor {
                    return true;
                }
                pending.push(parent.as_str());
            }
        }
        false
    }
}

impl Default for Hierarchy {
    fn default() -> Self {
        Hierarchy::with_builtins()
    }
}

impl fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hierarchy")
            .field("classes", &self.classes.read().len())
            .finish()
    }
}
