//! Transaction scoping for a single update-and-fetch.
//!
//! If the caller already manages the connection, the operation runs inside
//! the caller's transaction and nothing is committed here. Otherwise the
//! connection is put into managed mode for the duration of the operation,
//! committed on success and restored on every exit path.

use std::ops::{Deref, DerefMut};

use crate::connection::TransactionContext;
use crate::error::{Error, Result};

/// Wraps one operation in the right transaction scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionGuard;

impl TransactionGuard {
    /// Run `op` against `ctx` and commit as described in the module docs.
    ///
    /// Errors from `op` are returned unchanged. A failure while restoring the
    /// connection after `op` failed is logged, not returned.
    pub fn run<C, T, F>(ctx: &mut C, op: F) -> Result<T>
    where
        C: TransactionContext + ?Sized,
        F: FnOnce(&mut C) -> Result<T>,
    {
        if ctx.is_managed() {
            tracing::trace!("running inside caller-managed transaction");
            let value = op(&mut *ctx)?;
            ctx.commit_if_unmanaged()?;
            return Ok(value);
        }

        let mut scope = ManagedScope::enter(ctx)?;
        match op(&mut *scope).and_then(|value| scope.commit().map(|()| value)) {
            Ok(value) => {
                scope.leave()?;
                Ok(value)
            },
            Err(e) => {
                if let Err(leave_err) = scope.leave() {
                    tracing::warn!(error = %leave_err, "failed to leave managed transaction");
                }
                Err(e)
            },
        }
    }
}

/// Managed mode entered by the guard; left again on drop if still active.
struct ManagedScope<'a, C: TransactionContext + ?Sized> {
    ctx: &'a mut C,
    active: bool,
}

impl<'a, C: TransactionContext + ?Sized> ManagedScope<'a, C> {
    fn enter(ctx: &'a mut C) -> Result<Self> {
        ctx.enter_managed()?;
        if !ctx.is_managed() {
            if let Err(e) = ctx.leave_managed() {
                tracing::warn!(error = %e, "failed to leave managed transaction");
            }
            return Err(Error::TransactionState(
                "connection is not managed after entering managed mode".into(),
            ));
        }
        Ok(Self { ctx, active: true })
    }

    fn commit(&mut self) -> Result<()> {
        self.ctx.commit()
    }

    fn leave(mut self) -> Result<()> {
        self.active = false;
        self.ctx.leave_managed()?;
        if self.ctx.is_managed() {
            return Err(Error::TransactionState(
                "connection still managed after leaving managed mode".into(),
            ));
        }
        Ok(())
    }
}

impl<C: TransactionContext + ?Sized> Deref for ManagedScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.ctx
    }
}

impl<C: TransactionContext + ?Sized> DerefMut for ManagedScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.ctx
    }
}

impl<C: TransactionContext + ?Sized> Drop for ManagedScope<'_, C> {
    fn drop(&mut self) {
        if self.active {
            // Unwinding out of the operation.
            if let Err(e) = self.ctx.leave_managed() {
                tracing::warn!(error = %e, "failed to leave managed transaction during unwind");
            }
        }
    }
}
