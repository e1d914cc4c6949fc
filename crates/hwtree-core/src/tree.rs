//! Tree operations on device nodes
//!
//! Scanners build the inventory by handing finished nodes to
//! [`DeviceNode::add_child`], which keeps sibling ids unique and routes
//! nodes into the subtree of whichever child attracts their handle. After
//! scanning, [`DeviceNode::assign_phys_ids`] numbers every node that has no
//! physical address and [`DeviceNode::fix_inconsistencies`] repairs the
//! remaining attribute conflicts.

use tracing::{debug, trace};

use crate::class::DeviceClass;
use crate::env::Heuristics;
use crate::node::DeviceNode;
use crate::text::{hex_phys_id, numbered_id};

impl DeviceNode {
    // Children

    pub fn children(&self) -> &[DeviceNode] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&DeviceNode> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut DeviceNode> {
        self.children.get_mut(index)
    }

    /// Number of direct children of `class`; [`DeviceClass::Generic`]
    /// counts every child
    pub fn count_children(&self, class: DeviceClass) -> usize {
        if class == DeviceClass::Generic {
            return self.children.len();
        }
        self.children.iter().filter(|c| c.class == class).count()
    }

    fn has_child(&self, id: &str) -> bool {
        self.children.iter().any(|c| c.id == id)
    }

    /// Insert `node` below this one and return the inserted node.
    ///
    /// - If a child attracts the node's handle, the node is inserted into
    ///   that child instead, recursively.
    /// - A child already holding the same physical id loses it.
    /// - On an id collision the existing child becomes `id:k` and the new
    ///   node `id:k'`, each with the smallest free suffix.
    pub fn add_child(&mut self, node: DeviceNode) -> &mut DeviceNode {
        if let Some(pos) = self.children.iter().position(|c| c.attracts_node(&node)) {
            trace!(parent = %self.id, child = %self.children[pos].id, handle = %node.handle, "Node attracted");
            return self.children[pos].add_child(node);
        }

        if !node.physid.is_empty() {
            if let Some(incumbent) = self.children.iter_mut().find(|c| c.physid == node.physid) {
                debug!(
                    parent = %self.id,
                    existing = %incumbent.id,
                    added = %node.id,
                    physid = %node.physid,
                    "Duplicate physical id, clearing it on the existing child"
                );
                incumbent.physid.clear();
            }
        }

        let id = node.id.clone();
        let mut count = 0;
        let existing = self.children.iter().position(|c| c.id == id);

        if let Some(pos) = existing {
            while self.has_child(&numbered_id(&id, count)) {
                count += 1;
            }
            let renamed = numbered_id(&id, count);
            debug!(parent = %self.id, from = %id, to = %renamed, "Renaming existing child");
            self.children[pos].set_id(&renamed);
        }

        while self.has_child(&numbered_id(&id, count)) {
            count += 1;
        }

        let rename = existing.is_some() || self.has_child(&numbered_id(&id, 0));
        self.children.push(node);

        let last = self.children.len() - 1;
        let inserted = &mut self.children[last];
        if rename {
            inserted.set_id(&numbered_id(&id, count));
        }
        inserted
    }

    // Lookups

    /// Walk down a slash-separated id path such as `pci/network:1`
    pub fn get_child(&self, path: &str) -> Option<&DeviceNode> {
        let (base, rest) = split_path(path);
        let child = self.children.iter().find(|c| c.id == base)?;
        match rest {
            Some(rest) => child.get_child(rest),
            None => Some(child),
        }
    }

    pub fn get_child_mut(&mut self, path: &str) -> Option<&mut DeviceNode> {
        let (base, rest) = split_path(path);
        let child = self.children.iter_mut().find(|c| c.id == base)?;
        match rest {
            Some(rest) => child.get_child_mut(rest),
            None => Some(child),
        }
    }

    /// Direct child with the given physical id; an empty id never matches
    pub fn get_child_by_phys_id(&self, physid: &str) -> Option<&DeviceNode> {
        if physid.is_empty() {
            return None;
        }
        self.children.iter().find(|c| c.physid == physid)
    }

    pub fn get_child_by_phys_id_value(&self, physid: u64) -> Option<&DeviceNode> {
        self.get_child_by_phys_id(&hex_phys_id(physid))
    }

    /// First node, in pre-order starting with this one, accepted by `matches`
    pub fn find_child<F>(&self, matches: F) -> Option<&DeviceNode>
    where
        F: Fn(&DeviceNode) -> bool,
    {
        self.find_first(&matches)
    }

    pub fn find_child_mut<F>(&mut self, matches: F) -> Option<&mut DeviceNode>
    where
        F: Fn(&DeviceNode) -> bool,
    {
        self.find_first_mut(&matches)
    }

    fn find_first<F>(&self, matches: &F) -> Option<&DeviceNode>
    where
        F: Fn(&DeviceNode) -> bool,
    {
        if matches(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_first(matches))
    }

    fn find_first_mut<F>(&mut self, matches: &F) -> Option<&mut DeviceNode>
    where
        F: Fn(&DeviceNode) -> bool,
    {
        if matches(self) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_first_mut(matches))
    }

    /// An empty handle never matches
    pub fn find_child_by_handle(&self, handle: &str) -> Option<&DeviceNode> {
        if handle.is_empty() {
            return None;
        }
        self.find_child(|n| n.handle == handle)
    }

    pub fn find_child_by_handle_mut(&mut self, handle: &str) -> Option<&mut DeviceNode> {
        if handle.is_empty() {
            return None;
        }
        self.find_child_mut(|n| n.handle == handle)
    }

    /// Case-insensitive match on trimmed bus info; empty bus info never
    /// matches
    pub fn find_child_by_bus_info(&self, businfo: &str) -> Option<&DeviceNode> {
        let wanted = businfo.trim();
        if wanted.is_empty() {
            return None;
        }
        self.find_child(|n| n.businfo.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn find_child_by_bus_info_mut(&mut self, businfo: &str) -> Option<&mut DeviceNode> {
        let wanted = businfo.trim().to_string();
        if wanted.is_empty() {
            return None;
        }
        self.find_child_mut(|n| n.businfo.trim().eq_ignore_ascii_case(&wanted))
    }

    pub fn find_child_by_logical_name(&self, name: &str) -> Option<&DeviceNode> {
        self.find_child(|n| n.logicalnames.iter().any(|l| l == name))
    }

    pub fn find_child_by_logical_name_mut(&mut self, name: &str) -> Option<&mut DeviceNode> {
        self.find_child_mut(|n| n.logicalnames.iter().any(|l| l == name))
    }

    // Post-processing

    /// Give every node without a physical id the lowest free one among its
    /// siblings, starting at its class's base. Ids that are already set are
    /// never changed, so running this twice is a no-op.
    pub fn assign_phys_ids(&mut self) {
        for i in 0..self.children.len() {
            if self.children[i].physid.is_empty() {
                let mut candidate = self.children[i].class.phys_id_base();
                while self.get_child_by_phys_id_value(candidate).is_some() {
                    candidate += 1;
                }
                trace!(parent = %self.id, child = %self.children[i].id, physid = candidate, "Assigned physical id");
                self.children[i].set_phys_id_value(candidate);
            }

            self.children[i].assign_phys_ids();
        }
    }

    /// Repair attribute conflicts across the subtree.
    ///
    /// Capacity below size is zeroed, product and vendor guessing runs,
    /// and nodes with a logical name are claimed.
    pub fn fix_inconsistencies(&mut self, heuristics: &dyn Heuristics) {
        if self.capacity < self.size {
            debug!(node = %self.id, size = self.size, capacity = self.capacity, "Capacity below size, clearing it");
            self.capacity = 0;
        }

        heuristics.guess_product(self);
        heuristics.guess_vendor(self);

        if !self.logical_name().is_empty() {
            self.claim(false);
        }

        for child in &mut self.children {
            child.fix_inconsistencies(heuristics);
        }
    }

    /// Fill this node's unset attributes from another description of the
    /// same device.
    ///
    /// Scalars already set here win. `enabled` always follows `other`,
    /// `claimed` is sticky. Capabilities, their descriptions, configuration
    /// and hints from `other` are added and overwrite. Children are left
    /// alone.
    pub fn merge(&mut self, other: &DeviceNode) {
        debug!(node = %self.id, other = %other.id, "Merging node");

        if self.class == DeviceClass::Generic {
            self.class = other.class;
        }

        fill(&mut self.vendor, &other.vendor);
        fill(&mut self.product, &other.product);
        fill(&mut self.version, &other.version);
        fill(&mut self.date, &other.date);
        fill(&mut self.serial, &other.serial);
        fill(&mut self.slot, &other.slot);
        fill(&mut self.handle, &other.handle);
        fill(&mut self.description, &other.description);
        fill(&mut self.businfo, &other.businfo);
        fill(&mut self.physid, &other.physid);
        fill(&mut self.dev, &other.dev);

        fill_number(&mut self.start, other.start);
        fill_number(&mut self.size, other.size);
        fill_number(&mut self.capacity, other.capacity);
        fill_number(&mut self.clock, other.clock);
        if self.width == 0 {
            self.width = other.width;
        }

        self.enabled = other.enabled;
        if other.claimed() {
            self.claim(false);
        }

        if self.logicalnames.is_empty() {
            self.logicalnames = other.logicalnames.clone();
        }

        for feature in &other.features {
            self.add_capability(feature, "");
        }
        for (feature, description) in &other.features_descriptions {
            let _ = self.describe_capability(feature, description);
        }
        for (key, value) in &other.config {
            self.set_config(key, value);
        }
        for (key, value) in &other.hints {
            self.hints.insert(key.clone(), value.clone());
        }
    }
}

fn fill(target: &mut String, source: &str) {
    if target.is_empty() {
        *target = source.to_string();
    }
}

fn fill_number(target: &mut u64, source: u64) {
    if *target == 0 {
        *target = source;
    }
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('/') {
        Some((base, rest)) if !rest.is_empty() => (base, Some(rest)),
        Some((base, _)) => (base, None),
        None => (path, None),
    }
}
