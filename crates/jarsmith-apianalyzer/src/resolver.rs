//! Member resolution by inheritance over a pool of class digests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use crate::digest::{ClassDigest, ClassDigestCollection};
use crate::error::AnalyzerError;
use crate::generator::read_text_digest;

/// Digests keyed by internal name.
#[derive(Debug, Clone, Default)]
pub struct TypePool {
    types: HashMap<String, ClassDigest>,
}

impl TypePool {
    /// Fails on a type that appears twice.
    pub fn new(collection: &ClassDigestCollection) -> Result<Self, AnalyzerError> {
        let mut types = HashMap::with_capacity(collection.len());
        for class in collection {
            if types.insert(class.name.clone(), class.clone()).is_some() {
                return Err(AnalyzerError::DuplicateType(class.name.clone()));
            }
        }
        Ok(Self { types })
    }

    pub fn get(&self, name: &str) -> Option<&ClassDigest> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Answers whether a type, or a member reachable through a type's
/// supertypes, exists in a [`TypePool`].
///
/// Only name and descriptor equality is modelled; visibility and overload
/// selection are out of scope.
#[derive(Debug, Clone)]
pub struct ClassMemberResolver {
    pool: TypePool,
    /// Direct super class followed by direct interfaces.
    supertypes: HashMap<String, Vec<String>>,
    /// `(name, descriptor)` pairs declared directly on each type.
    members: HashMap<String, HashSet<(String, String)>>,
}

impl ClassMemberResolver {
    pub fn new(pool: TypePool) -> Self {
        let mut supertypes = HashMap::with_capacity(pool.len());
        let mut members = HashMap::with_capacity(pool.len());
        for (name, class) in &pool.types {
            let edges: Vec<String> = class
                .super_class
                .iter()
                .chain(&class.super_interfaces)
                .cloned()
                .collect();
            supertypes.insert(name.clone(), edges);

            let mut declared = HashSet::with_capacity(class.fields.len() + class.methods.len());
            for field in &class.fields {
                declared.insert((field.name.clone(), field.desc.clone()));
            }
            for method in &class.methods {
                declared.insert((method.name.clone(), method.desc.clone()));
            }
            members.insert(name.clone(), declared);
        }
        Self {
            pool,
            supertypes,
            members,
        }
    }

    pub fn from_collection(collection: &ClassDigestCollection) -> Result<Self, AnalyzerError> {
        Ok(Self::new(TypePool::new(collection)?))
    }

    /// Loads a text digest written by the generator.
    pub fn from_text_digest(path: &Path) -> Result<Self, AnalyzerError> {
        Self::from_collection(&read_text_digest(path)?)
    }

    pub fn pool(&self) -> &TypePool {
        &self.pool
    }

    pub fn is_type_resolvable(&self, name: &str) -> bool {
        self.pool.contains(name)
    }

    /// Breadth-first search from `owner` along super class and interface
    /// edges, visiting each type once.
    pub fn is_member_resolvable(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        let key = (name.to_string(), descriptor.to_string());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([owner]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if self
                .members
                .get(current)
                .is_some_and(|declared| declared.contains(&key))
            {
                return true;
            }
            if let Some(edges) = self.supertypes.get(current) {
                queue.extend(edges.iter().map(String::as_str));
            }
        }
        tracing::trace!(
            target: "jarsmith.apianalyzer",
            owner,
            name,
            descriptor,
            visited = visited.len(),
            "member not resolvable"
        );
        false
    }
}
