//! Dependency-ordered descriptor construction.
//!
//! Descriptor sets are flat lists of files whose imports may appear in any
//! order. [`DescriptorPool::build`] makes repeated passes over the list and
//! builds a file once every file it imports is built, giving up after
//! `2 × file_count` passes.

use prost_types::FileDescriptorProto;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::SchemaError;
use crate::types::{SchemaFile, ServiceDef};

#[derive(Debug, Clone, Default)]
pub struct DescriptorPool {
    /// Files in the order they were built (dependencies first).
    files: Vec<SchemaFile>,
    by_name: HashMap<String, usize>,
    /// Fully qualified message name -> index of the declaring file
    message_owner: HashMap<String, usize>,
    passes: usize,
}

impl DescriptorPool {
    pub fn build(protos: &[FileDescriptorProto]) -> Result<Self, SchemaError> {
        let mut pending = Vec::with_capacity(protos.len());
        let mut seen = HashSet::new();
        for (position, proto) in protos.iter().enumerate() {
            let file = SchemaFile::from_proto(position, proto)?;
            if !seen.insert(file.name.clone()) {
                return Err(SchemaError::DuplicateFile(file.name));
            }
            pending.push(Some(file));
        }

        let max_passes = 2 * protos.len();
        let mut pool = DescriptorPool::default();
        let mut remaining = pending.len();

        while remaining > 0 && pool.passes < max_passes {
            pool.passes += 1;
            let mut progressed = false;

            for slot in pending.iter_mut() {
                let ready = slot.as_ref().is_some_and(|file| {
                    file.dependencies
                        .iter()
                        .all(|dep| pool.by_name.contains_key(dep))
                });
                if !ready {
                    continue;
                }
                if let Some(file) = slot.take() {
                    pool.insert(file)?;
                    remaining -= 1;
                    progressed = true;
                }
            }

            if !progressed {
                break;
            }
        }

        if remaining > 0 {
            let built = &pool.by_name;
            let unresolved: Vec<&SchemaFile> = pending.iter().flatten().collect();
            let missing: BTreeSet<String> = unresolved
                .iter()
                .flat_map(|file| {
                    file.dependencies
                        .iter()
                        .filter(move |dep| !built.contains_key(*dep))
                        .map(move |dep| format!("{} -> {}", file.name, dep))
                })
                .collect();
            return Err(SchemaError::Unresolved {
                files: unresolved.iter().map(|f| f.name.clone()).collect(),
                missing: missing.into_iter().collect(),
                passes: pool.passes,
            });
        }

        tracing::debug!(
            files = pool.files.len(),
            passes = pool.passes,
            "descriptor pool built"
        );
        Ok(pool)
    }

    /// All of a file's method types must be declared in the file itself or in
    /// something it (transitively) imports.
    fn insert(&mut self, file: SchemaFile) -> Result<(), SchemaError> {
        let index = self.files.len();
        let visible = self.visible_files(&file.dependencies);

        for message in &file.messages {
            self.message_owner.entry(message.clone()).or_insert(index);
        }

        for service in &file.services {
            for method in &service.methods {
                for type_name in [&method.input_type, &method.output_type] {
                    let resolvable = file.declares_message(type_name)
                        || self
                            .message_owner
                            .get(type_name)
                            .is_some_and(|owner| visible.contains(owner));
                    if !resolvable {
                        return Err(SchemaError::UnknownMessage {
                            file: file.name.clone(),
                            service: service.name.clone(),
                            method: method.name.clone(),
                            type_name: type_name.clone(),
                        });
                    }
                }
            }
        }

        self.by_name.insert(file.name.clone(), index);
        self.files.push(file);
        Ok(())
    }

    fn visible_files(&self, dependencies: &[String]) -> HashSet<usize> {
        let mut visible = HashSet::new();
        let mut stack: Vec<usize> = dependencies
            .iter()
            .filter_map(|dep| self.by_name.get(dep).copied())
            .collect();
        while let Some(index) = stack.pop() {
            if visible.insert(index) {
                stack.extend(
                    self.files[index]
                        .dependencies
                        .iter()
                        .filter_map(|dep| self.by_name.get(dep).copied()),
                );
            }
        }
        visible
    }

    pub fn files(&self) -> &[SchemaFile] {
        &self.files
    }

    pub fn file(&self, name: &str) -> Option<&SchemaFile> {
        self.by_name.get(name).map(|&i| &self.files[i])
    }

    /// Number of passes the build needed.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// File that declares a fully qualified message.
    pub fn message_owner(&self, fq_name: &str) -> Option<&SchemaFile> {
        self.message_owner.get(fq_name).map(|&i| &self.files[i])
    }

    /// Every service with this simple name, across all files.
    pub fn services_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (&'a SchemaFile, &'a ServiceDef)> + 'a {
        self.files.iter().flat_map(move |file| {
            file.services
                .iter()
                .filter(move |s| s.name == name)
                .map(move |s| (file, s))
        })
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.files
            .iter()
            .flat_map(|f| f.services.iter().map(|s| s.name.as_str()))
            .collect()
    }
}
