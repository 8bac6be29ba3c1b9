//! Shared handle to a block that is being read and written at once

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use super::block::{Block, BlockId};
use crate::errors::{ExecResult, ExecutionError};

/// A block shared between the fetcher reading its rows and the output row
/// writing into it (passthrough), or between an executor and rows it keeps.
///
/// Borrows are short-lived: every accessor borrows for the duration of one
/// call. Exclusive ownership is recovered with [`SharedBlock::into_block`].
#[derive(Debug, Clone)]
pub struct SharedBlock(Rc<RefCell<Block>>);

impl SharedBlock {
    pub fn new(block: Block) -> Self {
        Self(Rc::new(RefCell::new(block)))
    }

    pub fn borrow(&self) -> Ref<'_, Block> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Block> {
        self.0.borrow_mut()
    }

    pub fn id(&self) -> BlockId {
        self.0.borrow().id()
    }

    pub fn size(&self) -> usize {
        self.0.borrow().size()
    }

    pub fn num_registers(&self) -> usize {
        self.0.borrow().num_registers()
    }

    /// Whether both handles refer to the same block
    pub fn ptr_eq(&self, other: &SharedBlock) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Recover exclusive ownership.
    ///
    /// Fails if another handle is still alive: handing a block downstream
    /// while someone else can still mutate it would break ownership.
    pub fn into_block(self) -> ExecResult<Block> {
        match Rc::try_unwrap(self.0) {
            Ok(cell) => Ok(cell.into_inner()),
            Err(shared) => Err(ExecutionError::internal(format!(
                "block {} is still shared by {} handles",
                shared.borrow().id(),
                Rc::strong_count(&shared)
            ))),
        }
    }
}
