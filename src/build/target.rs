//! The task graph.
//!
//! Each configured task becomes a [`BuildTarget`] with id `kind:name`.
//! Copy targets list vendor files, bundle targets list glob patterns and
//! groups only order other targets.

use crate::build::BuildError;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Byte-for-byte copy of vendor files
    Copy,
    /// Compile, minify and concatenate scripts
    Bundle,
    /// Runs nothing itself
    Group,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Copy => "copy",
            TargetKind::Bundle => "bundle",
            TargetKind::Group => "group",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct BuildTarget {
    /// `kind:name`, unique within a plan
    pub id: String,
    pub kind: TargetKind,
    /// Task name as written in the config
    pub name: String,
    /// Vendor file paths for copies, glob patterns for bundles
    pub sources: Vec<String>,
    /// Destination directory for copies, bundle file for bundles
    pub output: PathBuf,
    /// Ids of targets that must finish first
    pub dependencies: Vec<String>,
}

impl BuildTarget {
    fn new(kind: TargetKind, name: String, sources: Vec<String>, output: PathBuf) -> Self {
        let id = format!("{}:{}", kind, name);
        Self { id, kind, name, sources, output, dependencies: Vec::new() }
    }

    pub fn copy(name: String, sources: Vec<String>, dest: PathBuf) -> Self {
        Self::new(TargetKind::Copy, name, sources, dest)
    }

    pub fn bundle(name: String, patterns: Vec<String>, output: PathBuf) -> Self {
        Self::new(TargetKind::Bundle, name, patterns, output)
    }

    pub fn group(name: String) -> Self {
        Self::new(TargetKind::Group, name, Vec::new(), PathBuf::new())
    }

    pub fn with_dependency(self, dep: String) -> Self {
        self.with_dependencies(vec![dep])
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = String>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    /// Whether a task selector names this target.
    ///
    /// A selector is a task name (`scripts`), a kind (`bundle`), or
    /// `kind:name` where either side may be `*`.
    pub fn matches_filter(&self, selector: &str) -> bool {
        let part = |pattern: &str, value: &str| pattern == "*" || pattern == value;
        match selector.split_once(':') {
            Some((kind, name)) => part(kind, self.kind.as_str()) && part(name, &self.name),
            None => selector == self.name || selector == self.kind.as_str(),
        }
    }
}

/// Targets of one run, in config order.
#[derive(Debug, Default, Clone)]
pub struct BuildPlan {
    targets: Vec<BuildTarget>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_target(&mut self, target: BuildTarget) {
        self.targets.push(target);
    }

    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    pub fn get(&self, id: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Narrow the plan to targets matching any selector plus their
    /// transitive dependencies. A selector matching nothing is
    /// [`BuildError::UnknownTask`].
    pub fn select(self, selectors: &[String]) -> Result<Self, BuildError> {
        if selectors.is_empty() {
            return Ok(self);
        }

        let mut pending: Vec<&str> = Vec::new();
        for selector in selectors {
            let before = pending.len();
            pending.extend(self.targets.iter().filter(|t| t.matches_filter(selector)).map(|t| t.id.as_str()));
            if pending.len() == before {
                return Err(BuildError::UnknownTask(selector.clone()));
            }
        }

        let mut keep: HashSet<&str> = HashSet::new();
        while let Some(id) = pending.pop() {
            if keep.insert(id) {
                if let Some(target) = self.get(id) {
                    pending.extend(target.dependencies.iter().map(String::as_str));
                }
            }
        }

        let keep: HashSet<String> = keep.into_iter().map(str::to_string).collect();
        let targets = self.targets.into_iter().filter(|t| keep.contains(&t.id)).collect();
        Ok(Self { targets })
    }

    /// Every target after its dependencies, otherwise in config order.
    /// Fails with [`BuildError::CyclicDependency`] on a cycle.
    pub fn build_order(&self) -> Result<Vec<&BuildTarget>, BuildError> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut order = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            self.visit(target, &mut marks, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        target: &'a BuildTarget,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<&'a BuildTarget>,
    ) -> Result<(), BuildError> {
        match marks.get(target.id.as_str()) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(BuildError::CyclicDependency(target.id.clone())),
            None => {}
        }

        marks.insert(&target.id, Mark::InProgress);
        for dep in target.dependencies.iter().filter_map(|id| self.get(id)) {
            self.visit(dep, marks, order)?;
        }
        marks.insert(&target.id, Mark::Done);
        order.push(target);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Mark {
    InProgress,
    Done,
}
