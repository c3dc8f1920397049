use std::fmt;

use notify::EventKind;
use notify::event::ModifyKind;

/// Coarse operation kind attached to a raw filesystem notification.
///
/// Only `Write`, `Create` and `Rename` can start a settle-and-run cycle;
/// the rest are dropped by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Write,
    Rename,
    Remove,
    Chmod,
    Other,
}

impl OperationKind {
    /// Whether this kind can indicate new file content.
    pub fn is_content_change(self) -> bool {
        matches!(
            self,
            OperationKind::Create | OperationKind::Write | OperationKind::Rename
        )
    }
}

impl From<&EventKind> for OperationKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => OperationKind::Create,
            EventKind::Modify(ModifyKind::Name(_)) => OperationKind::Rename,
            EventKind::Modify(ModifyKind::Metadata(_)) => OperationKind::Chmod,
            EventKind::Modify(_) => OperationKind::Write,
            EventKind::Remove(_) => OperationKind::Remove,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => OperationKind::Other,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Create => "create",
            OperationKind::Write => "write",
            OperationKind::Rename => "rename",
            OperationKind::Remove => "remove",
            OperationKind::Chmod => "chmod",
            OperationKind::Other => "other",
        };
        f.write_str(s)
    }
}
