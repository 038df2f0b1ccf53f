//! Scene graph traversal.
//!
//! Nodes are visited depth-first from the default scene's roots, or from
//! every node when the document declares no scene. A node reachable along
//! several paths is visited once per path. A node that is its own ancestor
//! makes the document invalid.

use std::collections::HashSet;

use glam::{DAffine3, DMat4, DQuat, DVec3};
use log::debug;

use crate::error::{GltfError, Result};
use crate::schema::{GltfDocument, GltfId, Node};

/// The composed transform from a node to the content root.
///
/// Chains are immutable: descending into a child produces a new chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformChain {
    transform: DAffine3,
    depth: usize,
    has_transform: bool,
}

impl Default for TransformChain {
    fn default() -> Self {
        Self::root()
    }
}

impl TransformChain {
    pub fn root() -> Self {
        Self {
            transform: DAffine3::IDENTITY,
            depth: 0,
            has_transform: false,
        }
    }

    /// The chain for a child whose local transform is `local`.
    pub fn then(&self, local: Option<DAffine3>) -> Self {
        match local {
            Some(local) => Self {
                transform: self.transform * local,
                depth: self.depth + 1,
                has_transform: true,
            },
            None => Self {
                depth: self.depth + 1,
                ..*self
            },
        }
    }

    pub fn transform(&self) -> DAffine3 {
        self.transform
    }

    /// True if any node on the path declared a transform.
    pub fn has_transform(&self) -> bool {
        self.has_transform
    }

    /// Number of nodes on the path.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A node's local transform, if it declares one.
///
/// An explicit matrix takes precedence over translation, rotation and scale,
/// which compose as `T * R * S`.
pub fn local_transform(node: &Node) -> Option<DAffine3> {
    if let Some(matrix) = &node.matrix {
        return Some(DAffine3::from_mat4(DMat4::from_cols_array(matrix)));
    }
    if !node.has_transform() {
        return None;
    }

    let translation = node.translation.map(DVec3::from_array).unwrap_or(DVec3::ZERO);
    let scale = node.scale.map(DVec3::from_array).unwrap_or(DVec3::ONE);
    let rotation = node
        .rotation
        .map(|[x, y, z, w]| DQuat::from_xyzw(x, y, z, w))
        .filter(|q| q.length_squared() > 0.0)
        .map(DQuat::normalize)
        .unwrap_or(DQuat::IDENTITY);
    Some(DAffine3::from_scale_rotation_translation(scale, rotation, translation))
}

/// The nodes traversal starts from.
pub fn root_nodes(document: &GltfDocument) -> Vec<GltfId> {
    let scene = match &document.scene {
        Some(id) => document.scenes.get(id),
        None => document.scenes.get(&GltfId::Index(0)),
    };
    match scene {
        Some(scene) => scene.nodes.clone(),
        None => document.nodes.ids(),
    }
}

enum Step<'a> {
    Enter(&'a GltfId, TransformChain),
    Leave(&'a GltfId),
}

/// Walk the scene graph, calling `visit` for every node on every path.
///
/// Nodes are visited before their children, and children in declared order.
pub fn traverse<F>(document: &GltfDocument, mut visit: F) -> Result<()>
where
    F: FnMut(&GltfId, &Node, &TransformChain),
{
    let roots = root_nodes(document);
    let mut stack: Vec<Step<'_>> = roots
        .iter()
        .rev()
        .map(|root| Step::Enter(root, TransformChain::root()))
        .collect();
    let mut path: HashSet<&GltfId> = HashSet::new();

    while let Some(step) = stack.pop() {
        let (id, parent) = match step {
            Step::Enter(id, parent) => (id, parent),
            Step::Leave(id) => {
                path.remove(id);
                continue;
            }
        };
        if path.contains(id) {
            return Err(GltfError::CyclicNodeGraph(id.to_string()));
        }
        let Some(node) = document.nodes.get(id) else {
            debug!("node {} not found", id);
            continue;
        };

        let chain = parent.then(local_transform(node));
        visit(id, node, &chain);

        path.insert(id);
        stack.push(Step::Leave(id));
        stack.extend(node.children.iter().rev().map(|child| Step::Enter(child, chain)));
    }
    Ok(())
}
