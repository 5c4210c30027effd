//! Script/style registry with single-registration semantics

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::html;

/// Kind of registered asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Script,
    Style,
}

/// A registered script or stylesheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredAsset {
    pub kind: AssetKind,
    pub handle: String,
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub deps: Vec<String>,
    /// Scripts only: print before `</body>` instead of in `<head>`
    pub in_footer: bool,
    /// Styles only
    pub media: String,
    /// Extra attributes (`integrity`, `crossorigin`)
    pub data: BTreeMap<String, String>,
}

impl RegisteredAsset {
    pub fn script(handle: &str, src: &str, version: Option<&str>, deps: Vec<String>, in_footer: bool) -> Self {
        Self {
            kind: AssetKind::Script,
            handle: handle.to_string(),
            src: src.to_string(),
            version: version.map(str::to_string),
            deps,
            in_footer,
            media: String::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn style(handle: &str, src: &str, version: Option<&str>, deps: Vec<String>, media: &str) -> Self {
        Self {
            kind: AssetKind::Style,
            handle: handle.to_string(),
            src: src.to_string(),
            version: version.map(str::to_string),
            deps,
            in_footer: false,
            media: media.to_string(),
            data: BTreeMap::new(),
        }
    }

    pub fn integrity(&self) -> Option<&str> {
        self.data.get("integrity").map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct Queue {
    registered: HashMap<String, RegisteredAsset>,
    enqueued: Vec<String>,
    done: HashSet<String>,
}

impl Queue {
    /// Enqueued handles plus their dependencies, dependencies first
    ///
    /// Handles whose dependency chain is broken (unregistered or cyclic) are
    /// dropped with a warning.
    fn resolve(&self) -> Vec<String> {
        let mut ordered = Vec::new();
        let mut placed = HashSet::new();

        for handle in &self.enqueued {
            let mut visiting = Vec::new();
            let mut pending = Vec::new();
            if self.visit(handle, &mut visiting, &placed, &mut pending) {
                for h in pending {
                    if placed.insert(h.clone()) {
                        ordered.push(h);
                    }
                }
            } else {
                warn!(handle = %handle, "skipping asset with unresolved dependencies");
            }
        }

        ordered
    }

    fn visit(
        &self,
        handle: &str,
        visiting: &mut Vec<String>,
        placed: &HashSet<String>,
        out: &mut Vec<String>,
    ) -> bool {
        if placed.contains(handle) || out.iter().any(|h| h == handle) {
            return true;
        }
        if visiting.iter().any(|h| h == handle) {
            return false;
        }
        let Some(asset) = self.registered.get(handle) else {
            return false;
        };

        visiting.push(handle.to_string());
        for dep in &asset.deps {
            if !self.visit(dep, visiting, placed, out) {
                return false;
            }
        }
        visiting.pop();

        out.push(handle.to_string());
        true
    }

    /// Head scripts and everything they depend on
    fn head_set(&self, ordered: &[String]) -> HashSet<String> {
        let mut head = HashSet::new();
        let mut stack: Vec<&str> = ordered
            .iter()
            .filter(|h| self.registered.get(*h).is_some_and(|a| !a.in_footer))
            .map(String::as_str)
            .collect();

        while let Some(handle) = stack.pop() {
            if !head.insert(handle.to_string()) {
                continue;
            }
            if let Some(asset) = self.registered.get(handle) {
                stack.extend(asset.deps.iter().map(String::as_str));
            }
        }
        head
    }
}

/// Registered and enqueued assets for one page render
#[derive(Debug, Default)]
pub struct AssetRegistry {
    scripts: Queue,
    styles: Queue,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, kind: AssetKind) -> &Queue {
        match kind {
            AssetKind::Script => &self.scripts,
            AssetKind::Style => &self.styles,
        }
    }

    fn queue_mut(&mut self, kind: AssetKind) -> &mut Queue {
        match kind {
            AssetKind::Script => &mut self.scripts,
            AssetKind::Style => &mut self.styles,
        }
    }

    /// Register an asset; returns `false` if the handle already exists
    ///
    /// The first registration of a handle wins.
    pub fn register(&mut self, asset: RegisteredAsset) -> bool {
        let queue = self.queue_mut(asset.kind);
        if queue.registered.contains_key(&asset.handle) {
            return false;
        }
        queue.registered.insert(asset.handle.clone(), asset);
        true
    }

    /// Mark a registered handle for output; returns `false` if unknown
    pub fn enqueue(&mut self, kind: AssetKind, handle: &str) -> bool {
        let queue = self.queue_mut(kind);
        if !queue.registered.contains_key(handle) {
            return false;
        }
        if !queue.enqueued.iter().any(|h| h == handle) {
            queue.enqueued.push(handle.to_string());
        }
        true
    }

    /// Attach an attribute to a registered handle
    pub fn add_data(&mut self, kind: AssetKind, handle: &str, key: &str, value: &str) -> bool {
        match self.queue_mut(kind).registered.get_mut(handle) {
            Some(asset) => {
                asset.data.insert(key.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, kind: AssetKind, handle: &str) -> Option<&RegisteredAsset> {
        self.queue(kind).registered.get(handle)
    }

    pub fn is_registered(&self, kind: AssetKind, handle: &str) -> bool {
        self.queue(kind).registered.contains_key(handle)
    }

    pub fn is_enqueued(&self, kind: AssetKind, handle: &str) -> bool {
        self.queue(kind).enqueued.iter().any(|h| h == handle)
    }

    /// Enqueued handles of one kind, in enqueue order
    pub fn enqueued(&self, kind: AssetKind) -> &[String] {
        &self.queue(kind).enqueued
    }

    /// Stylesheets plus head scripts not yet printed
    pub fn render_head(&mut self) -> String {
        let mut out = String::new();

        let styles = self.styles.resolve();
        for handle in styles {
            if self.styles.done.insert(handle.clone()) {
                if let Some(asset) = self.styles.registered.get(&handle) {
                    out.push_str(&html::style_tag(asset));
                    out.push('\n');
                }
            }
        }

        let scripts = self.scripts.resolve();
        let head = self.scripts.head_set(&scripts);
        for handle in scripts.into_iter().filter(|h| head.contains(h)) {
            if self.scripts.done.insert(handle.clone()) {
                if let Some(asset) = self.scripts.registered.get(&handle) {
                    out.push_str(&html::script_tag(asset));
                    out.push('\n');
                }
            }
        }

        out
    }

    /// Every remaining enqueued script (and late styles)
    pub fn render_footer(&mut self) -> String {
        let mut out = String::new();

        for handle in self.styles.resolve() {
            if self.styles.done.insert(handle.clone()) {
                if let Some(asset) = self.styles.registered.get(&handle) {
                    out.push_str(&html::style_tag(asset));
                    out.push('\n');
                }
            }
        }

        for handle in self.scripts.resolve() {
            if self.scripts.done.insert(handle.clone()) {
                if let Some(asset) = self.scripts.registered.get(&handle) {
                    out.push_str(&html::script_tag(asset));
                    out.push('\n');
                }
            }
        }

        out
    }
}

/// Lowercase, map anything outside `[a-z0-9_-]` to `-`, collapse and trim dashes
pub fn sanitize_handle(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

/// Sanitize dependency handles, dropping empties and duplicates
pub fn sanitize_dependencies<S: AsRef<str>>(deps: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for dep in deps {
        let dep = sanitize_handle(dep.as_ref());
        if !dep.is_empty() && !out.contains(&dep) {
            out.push(dep);
        }
    }
    out
}
