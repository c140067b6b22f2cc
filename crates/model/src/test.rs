use std::collections::HashMap;

use crate::{
    member::{MemberId, Side},
    tree::TreeNode,
};

/// An in-memory placement tree for tests.
#[derive(Debug, Default, Clone)]
pub struct TestTree {
    nodes: HashMap<MemberId, TreeNode>,
}

impl TestTree {
    /// Get the tree as a [`TreeView`](crate::tree::TreeView).
    pub fn view(&self) -> &HashMap<MemberId, TreeNode> {
        &self.nodes
    }

    /// Insert the root member.
    pub fn insert_root(&mut self, id: &str) -> MemberId {
        let id = MemberId::from(id);
        self.nodes.insert(id.clone(), TreeNode::root(id.clone()));
        id
    }

    /// Attach a member under `parent` on the given side.
    ///
    /// # Panics
    /// Panics if the parent is missing or the slot is occupied.
    pub fn attach(&mut self, id: &str, parent: &MemberId, side: Side) -> MemberId {
        let id = MemberId::from(id);
        let parent_node = self.nodes.get_mut(parent).expect("parent must exist");
        let slot = match side {
            Side::Left => &mut parent_node.left,
            Side::Right => &mut parent_node.right,
        };
        assert!(slot.is_none(), "slot must be free");
        *slot = Some(id.clone());
        let level = parent_node.level + 1;
        self.nodes.insert(
            id.clone(),
            TreeNode {
                id: id.clone(),
                sponsor: Some(parent.clone()),
                upline: Some(parent.clone()),
                left: None,
                right: None,
                level,
                active: true,
            },
        );
        id
    }

    /// Mark a member inactive.
    pub fn deactivate(&mut self, id: &MemberId) {
        self.nodes.get_mut(id).expect("member must exist").active = false;
    }

    /// Overwrite a child link, bypassing the free-slot check.
    ///
    /// Only for corrupting the view in defensive-path tests.
    pub fn set_child(&mut self, id: &MemberId, side: Side, child: &MemberId) {
        let node = self.nodes.get_mut(id).expect("member must exist");
        match side {
            Side::Left => node.left = Some(child.clone()),
            Side::Right => node.right = Some(child.clone()),
        }
    }
}
