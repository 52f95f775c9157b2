//! Scoped session handling against a recording driver

use ontosync_graph::{
    run_in_transaction, CypherStatement, GraphDriver, GraphSession, GraphTransaction, Record,
};
use ontosync_model::{Backend, ClientError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Default)]
struct Script {
    fail_run: bool,
    fail_close: bool,
    fail_commit: bool,
}

/// Driver that records every call it receives.
#[derive(Clone, Default)]
struct RecordingDriver {
    calls: Arc<Mutex<Vec<&'static str>>>,
    script: Arc<Mutex<Script>>,
}

impl RecordingDriver {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn script(&self, script: Script) {
        *self.script.lock() = script;
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }
}

impl GraphDriver for RecordingDriver {
    fn open_session(&self, _database: Option<&str>) -> Result<Box<dyn GraphSession>, ClientError> {
        self.record("open");
        Ok(Box::new(RecordingSession(self.clone())))
    }
}

struct RecordingSession(RecordingDriver);

impl GraphSession for RecordingSession {
    fn begin_transaction(&mut self) -> Result<Box<dyn GraphTransaction>, ClientError> {
        self.0.record("begin");
        Ok(Box::new(RecordingTransaction(self.0.clone())))
    }

    fn close(self: Box<Self>) -> Result<(), ClientError> {
        self.0.record("close");
        if self.0.script.lock().fail_close {
            return Err(ClientError::new(Backend::Graph, "connection lost on close"));
        }
        Ok(())
    }
}

struct RecordingTransaction(RecordingDriver);

impl GraphTransaction for RecordingTransaction {
    fn run(&mut self, _statement: &CypherStatement) -> Result<Vec<Record>, ClientError> {
        self.0.record("run");
        if self.0.script.lock().fail_run {
            return Err(ClientError::new(Backend::Graph, "syntax error")
                .with_status("Neo.ClientError.Statement.SyntaxError"));
        }
        Ok(Vec::new())
    }

    fn commit(self: Box<Self>) -> Result<(), ClientError> {
        self.0.record("commit");
        if self.0.script.lock().fail_commit {
            return Err(ClientError::new(Backend::Graph, "commit rejected"));
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), ClientError> {
        self.0.record("rollback");
        Ok(())
    }
}

fn query(tx: &mut dyn GraphTransaction) -> Result<Vec<Record>, ClientError> {
    tx.run(&CypherStatement::raw("MATCH (n) RETURN n"))
}

#[test]
fn test_success_path_commits_then_closes() {
    let driver = RecordingDriver::default();
    run_in_transaction(&driver, None, query).unwrap();
    assert_eq!(driver.calls(), vec!["open", "begin", "run", "commit", "close"]);
}

#[test]
fn test_query_failure_rolls_back_then_closes() {
    let driver = RecordingDriver::default();
    driver.script(Script {
        fail_run: true,
        ..Script::default()
    });

    let err = run_in_transaction(&driver, None, query).unwrap_err();
    assert_eq!(err.message, "syntax error");
    assert_eq!(driver.calls(), vec!["open", "begin", "run", "rollback", "close"]);
}

#[test]
fn test_close_failure_after_query_failure_keeps_query_error() {
    let driver = RecordingDriver::default();
    driver.script(Script {
        fail_run: true,
        fail_close: true,
        ..Script::default()
    });

    let err = run_in_transaction(&driver, None, query).unwrap_err();
    assert_eq!(err.message, "syntax error");
    assert_eq!(err.status(), Some("Neo.ClientError.Statement.SyntaxError"));
    assert_eq!(driver.calls().last(), Some(&"close"));
}

#[test]
fn test_close_failure_after_success_is_reported() {
    let driver = RecordingDriver::default();
    driver.script(Script {
        fail_close: true,
        ..Script::default()
    });

    let err = run_in_transaction(&driver, None, query).unwrap_err();
    assert_eq!(err.message, "connection lost on close");
}

#[test]
fn test_commit_failure_still_closes_session() {
    let driver = RecordingDriver::default();
    driver.script(Script {
        fail_commit: true,
        ..Script::default()
    });

    let err = run_in_transaction(&driver, None, query).unwrap_err();
    assert_eq!(err.message, "commit rejected");
    assert_eq!(driver.calls(), vec!["open", "begin", "run", "commit", "close"]);
}

#[test]
fn test_panic_inside_work_releases_transaction_and_session() {
    let driver = RecordingDriver::default();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let _ = run_in_transaction(&driver, None, |tx| -> Result<(), ClientError> {
            query(tx)?;
            panic!("worker fault");
        });
    }));

    assert!(result.is_err());
    assert_eq!(driver.calls(), vec!["open", "begin", "run", "rollback", "close"]);
}
