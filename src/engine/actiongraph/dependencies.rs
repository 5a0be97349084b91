//! Second pass of building an actiongraph: the edges between the chains of
//! different devices. Every rule is a pure function of one action and the
//! index, returning the edges to insert.

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::NodeIndex;

use strata_api::{
    constants::ROOT_MOUNT_POINT_PATH,
    error::{InternalError, StorageError},
    Devicegraph, Sid, View,
};

use super::{
    action::{Action, ActionKind, Affect, ResizeMode, Side},
    synthesis::Synthesis,
    ActionPetgraph,
};

pub(super) type Edge = (NodeIndex, NodeIndex);

/// Lookup tables built once per synthesis and shared by all rules.
pub(super) struct Index<'a> {
    lhs: &'a Devicegraph,
    rhs: &'a Devicegraph,
    graph: &'a ActionPetgraph,
    chains: &'a BTreeMap<Sid, Vec<NodeIndex>>,

    /// Descendants of resized devices in the graph the resize reads, RHS
    /// for grows and LHS for shrinks. Orders stacked resizes.
    resize_descendants: HashMap<Sid, Vec<Sid>>,

    /// RHS descendants of resized devices. New ones wait for the resize
    /// whatever its direction.
    resize_new_descendants: HashMap<Sid, Vec<Sid>>,

    /// Mount actions with the path they mount at.
    mounts: Vec<(&'a str, NodeIndex)>,
    unmounts: Vec<(&'a str, NodeIndex)>,
    fstab_removes: Vec<(&'a str, NodeIndex)>,
}

impl<'a> Index<'a> {
    pub fn new(
        lhs: &'a Devicegraph,
        rhs: &'a Devicegraph,
        synthesis: &'a Synthesis,
    ) -> Result<Self, StorageError> {
        let mut index = Self {
            lhs,
            rhs,
            graph: &synthesis.graph,
            chains: &synthesis.chains,
            resize_descendants: HashMap::new(),
            resize_new_descendants: HashMap::new(),
            mounts: Vec::new(),
            unmounts: Vec::new(),
            fstab_removes: Vec::new(),
        };

        for vertex in synthesis.graph.node_indices() {
            let action = &synthesis.graph[vertex];
            let Affect::Device(sid) = action.affect else {
                continue;
            };
            let graph = match action.side() {
                Side::Lhs => lhs,
                Side::Rhs => rhs,
            };

            if let ActionKind::Resize { .. } = action.kind {
                index
                    .resize_descendants
                    .insert(sid, graph.descendants(sid, View::Classic)?);
                let created = rhs
                    .descendants(sid, View::Classic)?
                    .into_iter()
                    .filter(|descendant| !lhs.device_exists(*descendant))
                    .collect();
                index.resize_new_descendants.insert(sid, created);
                continue;
            }

            let Some(mp) = graph.find_device(sid)?.kind.as_mount_point() else {
                continue;
            };
            let path = mp.path.as_str();
            match action.kind {
                ActionKind::Mount => index.mounts.push((path, vertex)),
                ActionKind::Unmount => index.unmounts.push((path, vertex)),
                ActionKind::RemoveFromEtcFstab => index.fstab_removes.push((path, vertex)),
                _ => {}
            }
        }

        Ok(index)
    }

    fn chain(&self, sid: Sid) -> &[NodeIndex] {
        self.chains.get(&sid).map(Vec::as_slice).unwrap_or_default()
    }

    fn first_of(&self, sid: Sid) -> Option<NodeIndex> {
        self.chain(sid).first().copied()
    }

    fn last_of(&self, sid: Sid) -> Option<NodeIndex> {
        self.chain(sid).last().copied()
    }

    fn find(&self, sid: Sid, matches: impl Fn(&Action) -> bool) -> Option<NodeIndex> {
        self.chain(sid)
            .iter()
            .copied()
            .find(|v| matches(&self.graph[*v]))
    }

    fn delete_of(&self, sid: Sid) -> Option<NodeIndex> {
        self.find(sid, Action::deletes_device)
    }

    fn create_of(&self, sid: Sid) -> Option<NodeIndex> {
        self.find(sid, Action::creates_device)
    }

    fn resize_of(&self, sid: Sid, mode: ResizeMode) -> Option<NodeIndex> {
        self.find(sid, |a| a.kind == ActionKind::Resize { mode })
    }

    fn is_created(&self, sid: Sid) -> bool {
        !self.lhs.device_exists(sid) && self.rhs.device_exists(sid)
    }

    fn is_deleted(&self, sid: Sid) -> bool {
        self.lhs.device_exists(sid) && !self.rhs.device_exists(sid)
    }
}

/// Whether `path` lies below `base`, e.g. `/a/b` below `/a` or `/a` below `/`.
fn is_below(path: &str, base: &str) -> bool {
    if path == base {
        return false;
    }
    base == ROOT_MOUNT_POINT_PATH && path.starts_with('/')
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Edges involving `vertex` that order it against actions of other devices.
pub(super) fn add_dependencies(vertex: NodeIndex, index: &Index) -> Result<Vec<Edge>, StorageError> {
    let action = &index.graph[vertex];
    let mut edges = Vec::new();

    match (action.affect, action.kind) {
        (Affect::Holder { parent, child }, ActionKind::Create) => {
            holder_create(vertex, parent, child, index, &mut edges)?
        }
        (Affect::Holder { parent, child }, ActionKind::Delete) => {
            holder_delete(vertex, parent, child, index, &mut edges)?
        }
        (Affect::Holder { .. }, _) => {}
        (Affect::Device(sid), ActionKind::Create) => create(vertex, sid, index, &mut edges)?,
        (Affect::Device(sid), ActionKind::Delete) => delete(vertex, sid, index, &mut edges)?,
        (Affect::Device(sid), ActionKind::Resize { mode }) => {
            resize(vertex, sid, mode, index, &mut edges)?
        }
        (Affect::Device(sid), ActionKind::Mount) => mount(vertex, sid, index, &mut edges)?,
        (Affect::Device(sid), ActionKind::Unmount) => unmount(vertex, sid, index, &mut edges)?,
        (Affect::Device(sid), ActionKind::AddToEtcFstab) => {
            add_to_etc_fstab(vertex, sid, index, &mut edges)?
        }
        (Affect::Device(_), _) => {}
    }

    Ok(edges)
}

fn create(vertex: NodeIndex, sid: Sid, index: &Index, edges: &mut Vec<Edge>) -> Result<(), StorageError> {
    for parent in index.rhs.parents(sid, View::All)? {
        if index.is_created(parent) {
            let last = index
                .last_of(parent)
                .ok_or_else(|| StorageError::new(InternalError::NoParentCreateAction { sid: parent }))?;
            edges.push((last, vertex));
            continue;
        }

        // Make room first, e.g. the old filesystem goes before the new one
        for old_child in index.lhs.children(parent, View::All).unwrap_or_default() {
            if index.is_deleted(old_child) {
                if let Some(delete) = index.delete_of(old_child) {
                    edges.push((delete, vertex));
                }
            }
        }
    }

    let mp_path = index
        .rhs
        .find_device(sid)?
        .kind
        .as_mount_point()
        .map(|mp| mp.path.as_str());
    if let Some(path) = mp_path {
        edges.extend(
            index
                .mounts
                .iter()
                .filter(|(base, _)| is_below(path, base))
                .map(|(_, mount)| (*mount, vertex)),
        );
    }

    Ok(())
}

fn delete(vertex: NodeIndex, sid: Sid, index: &Index, edges: &mut Vec<Edge>) -> Result<(), StorageError> {
    for parent in index.lhs.parents(sid, View::All)? {
        if index.is_deleted(parent) {
            if let Some(first) = index.first_of(parent) {
                edges.push((vertex, first));
            }
        }
    }
    Ok(())
}

fn resize(
    vertex: NodeIndex,
    sid: Sid,
    mode: ResizeMode,
    index: &Index,
    edges: &mut Vec<Edge>,
) -> Result<(), StorageError> {
    let created = index
        .resize_new_descendants
        .get(&sid)
        .map(Vec::as_slice)
        .unwrap_or_default();
    edges.extend(
        created
            .iter()
            .filter_map(|descendant| index.create_of(*descendant))
            .map(|create| (vertex, create)),
    );

    let descendants = index
        .resize_descendants
        .get(&sid)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for descendant in descendants {
        // Grow from the bottom up, shrink from the top down
        if let Some(stacked) = index.resize_of(*descendant, mode) {
            edges.push(match mode {
                ResizeMode::Grow => (vertex, stacked),
                ResizeMode::Shrink => (stacked, vertex),
            });
        }
    }

    match mode {
        ResizeMode::Grow => {
            for sibling in index.lhs.siblings(sid, View::All)? {
                if let Some(delete) = index.delete_of(sibling).filter(|_| index.is_deleted(sibling)) {
                    edges.push((delete, vertex));
                }
            }
        }
        ResizeMode::Shrink => {
            for sibling in index.rhs.siblings(sid, View::All).unwrap_or_default() {
                if let Some(create) = index.create_of(sibling).filter(|_| index.is_created(sibling)) {
                    edges.push((vertex, create));
                }
            }
        }
    }

    Ok(())
}

fn mount(vertex: NodeIndex, sid: Sid, index: &Index, edges: &mut Vec<Edge>) -> Result<(), StorageError> {
    if let Some(mountable) = index.rhs.mountable_of(sid) {
        edges.extend(
            index
                .chain(mountable)
                .iter()
                .filter(|v| {
                    matches!(
                        index.graph[**v].kind,
                        ActionKind::Create
                            | ActionKind::Resize { .. }
                            | ActionKind::SetLabel
                            | ActionKind::SetUuid
                            | ActionKind::SetTuneOptions
                    )
                })
                .map(|v| (*v, vertex)),
        );
    }

    let Some(mp) = index.rhs.find_device(sid)?.kind.as_mount_point() else {
        return Ok(());
    };

    // Another filesystem may still be mounted at the same place
    edges.extend(
        index
            .unmounts
            .iter()
            .filter(|(path, _)| *path == mp.path)
            .map(|(_, unmount)| (*unmount, vertex)),
    );
    edges.extend(
        index
            .mounts
            .iter()
            .filter(|(base, _)| is_below(&mp.path, base))
            .map(|(_, parent_mount)| (*parent_mount, vertex)),
    );

    Ok(())
}

fn unmount(vertex: NodeIndex, sid: Sid, index: &Index, edges: &mut Vec<Edge>) -> Result<(), StorageError> {
    let Some(mp) = index.lhs.find_device(sid)?.kind.as_mount_point() else {
        return Ok(());
    };
    edges.extend(
        index
            .unmounts
            .iter()
            .filter(|(path, _)| is_below(path, &mp.path))
            .map(|(_, nested)| (*nested, vertex)),
    );
    Ok(())
}

fn add_to_etc_fstab(
    vertex: NodeIndex,
    sid: Sid,
    index: &Index,
    edges: &mut Vec<Edge>,
) -> Result<(), StorageError> {
    let Some(mp) = index.rhs.find_device(sid)?.kind.as_mount_point() else {
        return Ok(());
    };

    edges.extend(
        index
            .fstab_removes
            .iter()
            .filter(|(path, _)| *path == mp.path)
            .map(|(_, remove)| (*remove, vertex)),
    );

    let is_swap = index
        .rhs
        .mountable_of(sid)
        .and_then(|m| index.rhs.find_device(m).ok())
        .and_then(|d| d.kind.as_blk_filesystem())
        .is_some_and(|fs| fs.fs_type.is_swap());
    if is_swap {
        edges.extend(
            index
                .mounts
                .iter()
                .filter(|(path, _)| *path == ROOT_MOUNT_POINT_PATH)
                .map(|(_, root_mount)| (*root_mount, vertex)),
        );
    }

    Ok(())
}

fn holder_create(
    vertex: NodeIndex,
    parent: Sid,
    child: Sid,
    index: &Index,
    edges: &mut Vec<Edge>,
) -> Result<(), StorageError> {
    if let Some(last) = index.last_of(parent) {
        edges.push((last, vertex));
    }

    // New devices on the child need the extended child, e.g. LVs on a VG
    for grandchild in index.rhs.children(child, View::All)? {
        if index.is_created(grandchild) {
            if let Some(create) = index.create_of(grandchild) {
                edges.push((vertex, create));
            }
        }
    }

    // Grows on top of the child only work once the new member is in
    let grown = std::iter::once(child).chain(index.rhs.descendants(child, View::Classic)?);
    edges.extend(
        grown
            .filter_map(|sid| index.resize_of(sid, ResizeMode::Grow))
            .map(|grow| (vertex, grow)),
    );

    Ok(())
}

fn holder_delete(
    vertex: NodeIndex,
    parent: Sid,
    child: Sid,
    index: &Index,
    edges: &mut Vec<Edge>,
) -> Result<(), StorageError> {
    if let Some(first) = index.first_of(parent) {
        edges.push((vertex, first));
    }

    for grandchild in index.lhs.children(child, View::All)? {
        if index.is_deleted(grandchild) {
            if let Some(delete) = index.delete_of(grandchild) {
                edges.push((delete, vertex));
            }
        }
    }

    // The child has to shrink before a member can leave
    if let Some(shrink) = index.resize_of(child, ResizeMode::Shrink) {
        edges.push((shrink, vertex));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_below() {
        assert!(is_below("/data", "/"));
        assert!(is_below("/data/logs", "/data"));
        assert!(!is_below("/data2", "/data"));
        assert!(!is_below("/data", "/data"));
        assert!(!is_below("/", "/"));
        assert!(!is_below("swap", "/"));
    }
}
