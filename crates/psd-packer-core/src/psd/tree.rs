use std::sync::Arc;

use tracing::{debug, warn};

use super::{LayerKind, LayerRecord};

/// Node of the reconstructed layer hierarchy.
#[derive(Debug, Clone)]
pub enum LayerNode {
    /// A group; `record` is the group's opening record (name, visibility, opacity).
    Group {
        name: String,
        record: Arc<LayerRecord>,
        children: Vec<LayerNode>,
    },
    Layer {
        name: String,
        layer: Arc<LayerRecord>,
    },
}

impl LayerNode {
    pub fn name(&self) -> &str {
        match self {
            LayerNode::Group { name, .. } | LayerNode::Layer { name, .. } => name,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, LayerNode::Group { .. })
    }

    /// Children of a group; empty for plain layers.
    pub fn children(&self) -> &[LayerNode] {
        match self {
            LayerNode::Group { children, .. } => children,
            LayerNode::Layer { .. } => &[],
        }
    }

    pub fn layer(&self) -> Option<&Arc<LayerRecord>> {
        match self {
            LayerNode::Layer { layer, .. } => Some(layer),
            LayerNode::Group { .. } => None,
        }
    }

    /// Depth-first pre-order visit of this node and its descendants with their depth.
    pub fn walk<F: FnMut(&LayerNode, usize)>(&self, f: &mut F) {
        self.walk_at(0, f);
    }

    fn walk_at<F: FnMut(&LayerNode, usize)>(&self, depth: usize, f: &mut F) {
        f(self, depth);
        for child in self.children() {
            child.walk_at(depth + 1, f);
        }
    }
}

struct OpenGroup {
    record: Arc<LayerRecord>,
    children: Vec<LayerNode>,
}

impl OpenGroup {
    fn into_node(self) -> LayerNode {
        LayerNode::Group {
            name: self.record.name.clone(),
            record: self.record,
            children: self.children,
        }
    }
}

/// Rebuilds the group hierarchy from the flat, bottom-to-top layer list.
///
/// The list is walked in reverse so a group's opening record (which sits above its
/// children in the file) is seen before them, and the end marker after them. The
/// result lists siblings top-to-bottom. End markers with no open group are ignored;
/// groups still open when the list runs out are closed implicitly.
pub fn build_layer_tree(layers: &[Arc<LayerRecord>]) -> Vec<LayerNode> {
    let mut root: Vec<LayerNode> = Vec::new();
    let mut stack: Vec<OpenGroup> = Vec::new();

    for layer in layers.iter().rev() {
        match layer.kind {
            LayerKind::GroupOpen { .. } => stack.push(OpenGroup {
                record: Arc::clone(layer),
                children: Vec::new(),
            }),
            LayerKind::GroupEnd => match stack.pop() {
                Some(group) => current(&mut stack, &mut root).push(group.into_node()),
                None => warn!(layer = %layer.name, "group end marker with no open group; ignored"),
            },
            LayerKind::Normal => current(&mut stack, &mut root).push(LayerNode::Layer {
                name: layer.name.clone(),
                layer: Arc::clone(layer),
            }),
        }
    }

    while let Some(group) = stack.pop() {
        debug!(group = %group.record.name, "closing unterminated group");
        current(&mut stack, &mut root).push(group.into_node());
    }
    root
}

fn current<'a>(stack: &'a mut [OpenGroup], root: &'a mut Vec<LayerNode>) -> &'a mut Vec<LayerNode> {
    match stack.last_mut() {
        Some(group) => &mut group.children,
        None => root,
    }
}
