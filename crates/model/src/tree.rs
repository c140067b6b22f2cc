use std::collections::{HashMap, HashSet, VecDeque};

use crate::member::MemberId;

pub use crate::member::Side;

/// Tree-link snapshot of a single member.
///
/// Links are plain id references into an id-indexed view, never live
/// object references.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeNode {
    /// Member id.
    pub id: MemberId,
    /// Who referred the member. `None` only for the root.
    pub sponsor: Option<MemberId>,
    /// Immediate tree parent. Diverges from `sponsor` under spillover.
    pub upline: Option<MemberId>,
    /// Left child. Set at most once, never re-parented.
    pub left: Option<MemberId>,
    /// Right child. Set at most once, never re-parented.
    pub right: Option<MemberId>,
    /// Depth in the tree, root = 1.
    pub level: u32,
    /// Whether the member is active.
    pub active: bool,
}

impl TreeNode {
    /// Create the root node.
    pub fn root(id: MemberId) -> Self {
        Self {
            id,
            sponsor: None,
            upline: None,
            left: None,
            right: None,
            level: 1,
            active: true,
        }
    }

    /// Get the child on the given side.
    pub fn child(&self, side: Side) -> Option<&MemberId> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    /// Whether the slot on the given side is free.
    pub fn is_free(&self, side: Side) -> bool {
        self.child(side).is_none()
    }
}

/// An id-indexed, read-only view of the placement tree.
pub trait TreeView {
    /// Look up a node by member id.
    fn node(&self, id: &MemberId) -> Option<&TreeNode>;
}

impl TreeView for HashMap<MemberId, TreeNode> {
    fn node(&self, id: &MemberId) -> Option<&TreeNode> {
        self.get(id)
    }
}

impl<V: TreeView + ?Sized> TreeView for &V {
    fn node(&self, id: &MemberId) -> Option<&TreeNode> {
        (**self).node(id)
    }
}

/// Extension trait for [`TreeView`] with utils.
pub trait TreeViewExt: TreeView {
    /// Look up a node, failing with [`Error::MemberNotFound`](crate::Error::MemberNotFound).
    fn try_node(&self, id: &MemberId) -> crate::Result<&TreeNode> {
        self.node(id).ok_or(crate::Error::MemberNotFound)
    }
}

impl<V: TreeView + ?Sized> TreeViewExt for V {}

/// The slot a new member attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    /// Tree parent of the new member. `None` for a root signup.
    pub upline: Option<MemberId>,
    /// Side of the parent the new member occupies.
    pub side: Side,
    /// Depth of the new member, root = 1.
    pub level: u32,
}

impl Placement {
    fn root() -> Self {
        Self {
            upline: None,
            side: Side::default(),
            level: 1,
        }
    }

    fn under(node: &TreeNode, side: Side) -> crate::Result<Self> {
        Ok(Self {
            upline: Some(node.id.clone()),
            side,
            level: node.level.checked_add(1).ok_or(crate::Error::Overflow)?,
        })
    }
}

/// Locate the slot for a new member under `sponsor`.
///
/// A `None` sponsor is a root signup. Otherwise the sponsor's
/// `preferred` slot wins if free, then the opposite slot, then a
/// breadth-first search below the sponsor in strict level order
/// (left before right, parents in discovery order): the first node
/// found with a free left slot, else the first with a free right slot.
///
/// The result is a candidate only; the caller must re-validate the slot
/// inside the transaction that claims it.
pub fn locate(
    view: &impl TreeView,
    sponsor: Option<&MemberId>,
    preferred: Side,
) -> crate::Result<Placement> {
    let Some(sponsor) = sponsor else {
        return Ok(Placement::root());
    };
    let node = view.try_node(sponsor)?;
    if !node.active {
        return Err(crate::Error::InactiveSponsor);
    }
    if node.is_free(preferred) {
        return Placement::under(node, preferred);
    }
    if node.is_free(preferred.opposite()) {
        return Placement::under(node, preferred.opposite());
    }
    spillover(view, node)
}

/// Locate against an explicitly requested placement target and side.
///
/// Unlike [`locate`], an occupied slot is an error here, never a
/// fallback.
pub fn locate_at(
    view: &impl TreeView,
    target: &MemberId,
    requested: Side,
) -> crate::Result<Placement> {
    let node = view.try_node(target)?;
    if !node.is_free(requested) {
        return Err(crate::Error::SlotOccupied(requested));
    }
    Placement::under(node, requested)
}

/// Breadth-first spillover search below a full sponsor.
fn spillover(view: &impl TreeView, from: &TreeNode) -> crate::Result<Placement> {
    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    let mut first_free_right: Option<Placement> = None;

    queue.push_back(from.id.clone());
    visited.insert(from.id.clone());

    while let Some(id) = queue.pop_front() {
        let node = view.try_node(&id)?;
        if node.is_free(Side::Left) {
            return Placement::under(node, Side::Left);
        }
        if first_free_right.is_none() && node.is_free(Side::Right) {
            first_free_right = Some(Placement::under(node, Side::Right)?);
        }
        for side in [Side::Left, Side::Right] {
            if let Some(child) = node.child(side) {
                // Tree links are acyclic by construction; the guard keeps
                // a corrupted view from looping the search.
                if !visited.insert(child.clone()) {
                    return Err(crate::Error::CycleDetected);
                }
                queue.push_back(child.clone());
            }
        }
    }

    first_free_right.ok_or(crate::Error::NoFreeSlot)
}
