//! Scoped session and transaction handling.
//!
//! Both guards release what they hold when dropped: an open transaction is
//! rolled back, an open session is closed. The explicit paths
//! ([`TransactionGuard::commit`], [`SessionGuard::close`]) report failures;
//! the drop paths can only log them.

use crate::driver::{GraphDriver, GraphSession, GraphTransaction};
use ontosync_model::ClientError;

pub struct SessionGuard {
    session: Option<Box<dyn GraphSession>>,
}

impl SessionGuard {
    pub fn open(driver: &dyn GraphDriver, database: Option<&str>) -> Result<Self, ClientError> {
        Ok(Self {
            session: Some(driver.open_session(database)?),
        })
    }

    pub fn begin_transaction(&mut self) -> Result<TransactionGuard, ClientError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| closed_error("session"))?;
        Ok(TransactionGuard {
            tx: Some(session.begin_transaction()?),
        })
    }

    pub fn close(mut self) -> Result<(), ClientError> {
        match self.session.take() {
            Some(session) => session.close(),
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(err) = session.close() {
                tracing::warn!(error = %err, "failed to close graph session on drop");
            }
        }
    }
}

pub struct TransactionGuard {
    tx: Option<Box<dyn GraphTransaction>>,
}

impl TransactionGuard {
    pub fn transaction(&mut self) -> Result<&mut dyn GraphTransaction, ClientError> {
        let tx: &mut dyn GraphTransaction = match self.tx.as_mut() {
            Some(tx) => tx.as_mut(),
            None => return Err(closed_error("transaction")),
        };
        Ok(tx)
    }

    pub fn commit(mut self) -> Result<(), ClientError> {
        match self.tx.take() {
            Some(tx) => tx.commit(),
            None => Err(closed_error("transaction")),
        }
    }

    pub fn rollback(mut self) -> Result<(), ClientError> {
        match self.tx.take() {
            Some(tx) => tx.rollback(),
            None => Ok(()),
        }
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(err) = tx.rollback() {
                tracing::warn!(error = %err, "failed to roll back graph transaction on drop");
            }
        }
    }
}

fn closed_error(what: &str) -> ClientError {
    ClientError::new(ontosync_model::Backend::Graph, format!("{what} already closed"))
}

/// Acquire a session, begin a transaction, run `work`, commit (or roll back
/// on failure) and close the session.
///
/// When `work` fails and closing the session fails too, the error of `work`
/// is returned and the close failure is logged.
pub fn run_in_transaction<T>(
    driver: &dyn GraphDriver,
    database: Option<&str>,
    work: impl FnOnce(&mut dyn GraphTransaction) -> Result<T, ClientError>,
) -> Result<T, ClientError> {
    let mut session = SessionGuard::open(driver, database)?;
    let outcome = run_scoped(&mut session, work);

    match (outcome, session.close()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::warn!(
                error = %close_err,
                cause = %err,
                "failed to close graph session after query failure"
            );
            Err(err)
        }
    }
}

fn run_scoped<T>(
    session: &mut SessionGuard,
    work: impl FnOnce(&mut dyn GraphTransaction) -> Result<T, ClientError>,
) -> Result<T, ClientError> {
    let mut tx = session.begin_transaction()?;
    match work(tx.transaction()?) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::warn!(
                    error = %rollback_err,
                    cause = %err,
                    "failed to roll back graph transaction after query failure"
                );
            }
            Err(err)
        }
    }
}
