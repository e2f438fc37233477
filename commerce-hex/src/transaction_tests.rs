//! TransactionCoordinator unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use commerce_types::{DomainEvent, IsolationLevel, RepoError, TransactionalConnection};
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    use crate::{BroadcastEventBus, RunOptions, TransactionCoordinator, TransactionManager};

    /// In-memory store whose transactions buffer writes until commit.
    #[derive(Default)]
    pub struct MemoryConnection {
        committed: Mutex<Vec<String>>,
        isolation: Mutex<Vec<Option<IsolationLevel>>>,
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        fail_begin: AtomicBool,
        fail_commit: AtomicBool,
        fail_rollback: AtomicBool,
    }

    pub struct MemorySession {
        writes: Vec<String>,
    }

    impl MemorySession {
        pub fn insert(&mut self, value: &str) {
            self.writes.push(value.to_string());
        }
    }

    impl MemoryConnection {
        fn committed(&self) -> Vec<String> {
            self.committed.lock().unwrap().clone()
        }

        fn counts(&self) -> (usize, usize, usize) {
            (
                self.begins.load(Ordering::SeqCst),
                self.commits.load(Ordering::SeqCst),
                self.rollbacks.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl TransactionalConnection for MemoryConnection {
        type Handle = MemorySession;

        async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<MemorySession, RepoError> {
            if self.fail_begin.load(Ordering::SeqCst) {
                return Err(RepoError::Transaction("begin failed".into()));
            }
            self.begins.fetch_add(1, Ordering::SeqCst);
            self.isolation.lock().unwrap().push(isolation);
            Ok(MemorySession { writes: Vec::new() })
        }

        async fn commit(&self, handle: MemorySession) -> Result<(), RepoError> {
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err(RepoError::Transaction("commit failed".into()));
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            self.committed.lock().unwrap().extend(handle.writes);
            Ok(())
        }

        async fn rollback(&self, _handle: MemorySession) -> Result<(), RepoError> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            if self.fail_rollback.load(Ordering::SeqCst) {
                return Err(RepoError::Transaction("rollback failed".into()));
            }
            Ok(())
        }
    }

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("boom")]
        Boom,
        #[error("custom")]
        Custom,
        #[error(transparent)]
        Repo(#[from] RepoError),
    }

    type Tx = TransactionManager<MemoryConnection>;

    fn setup() -> (TransactionCoordinator<MemoryConnection>, BroadcastEventBus) {
        let bus = BroadcastEventBus::default();
        let coordinator = TransactionCoordinator::new(MemoryConnection::default(), Arc::new(bus.clone()));
        (coordinator, bus)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Single level
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_success_commits() {
        let (coordinator, _) = setup();

        let result: Result<i32, TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                Ok(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(coordinator.connection().committed(), ["A"]);
        assert_eq!(coordinator.connection().counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_failure_rolls_back() {
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                Err(TestError::Boom)
            })
            .await;

        assert!(matches!(result, Err(TestError::Boom)));
        assert!(coordinator.connection().committed().is_empty());
        assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_outermost_error_handler_replaces_error() {
        let (coordinator, _) = setup();

        let options = RunOptions::new().with_error_handler(|_: TestError| async {
            tokio::task::yield_now().await;
            TestError::Custom
        });
        let result: Result<(), TestError> = coordinator
            .run(options, async |_tx: &mut Tx| Err(TestError::Boom))
            .await;

        assert!(matches!(result, Err(TestError::Custom)));
        assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_error_handler_can_keep_original_error() {
        let (coordinator, _) = setup();
        let seen = Mutex::new(None);
        let seen_ref = &seen;

        let options = RunOptions::new().with_error_handler(move |err: TestError| async move {
            *seen_ref.lock().unwrap() = Some(err.to_string());
            err
        });
        let result: Result<(), TestError> = coordinator
            .run(options, async |_tx: &mut Tx| Err(TestError::Boom))
            .await;

        assert!(matches!(result, Err(TestError::Boom)));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_isolation_level_reaches_connection() {
        let (coordinator, _) = setup();

        let options = RunOptions::new().with_isolation(IsolationLevel::Serializable);
        let result: Result<(), TestError> = coordinator.run(options, async |_tx: &mut Tx| Ok(())).await;

        assert!(result.is_ok());
        assert_eq!(
            *coordinator.connection().isolation.lock().unwrap(),
            [Some(IsolationLevel::Serializable)]
        );
    }

    #[tokio::test]
    async fn test_commit_failure_is_returned() {
        let (coordinator, bus) = setup();
        let mut rx = bus.subscribe();
        coordinator.connection().fail_commit.store(true, Ordering::SeqCst);

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.emit(DomainEvent::new("customer.created", json!({})));
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(TestError::Repo(RepoError::Transaction(_)))));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_begin_failure_skips_unit_of_work() {
        let (coordinator, _) = setup();
        coordinator.connection().fail_begin.store(true, Ordering::SeqCst);
        let mut called = false;

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |_tx: &mut Tx| {
                called = true;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(TestError::Repo(RepoError::Transaction(msg))) if msg == "begin failed"
        ));
        assert!(!called);
        assert_eq!(coordinator.connection().counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_unit_of_work_error() {
        let (coordinator, _) = setup();
        coordinator.connection().fail_rollback.store(true, Ordering::SeqCst);

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                Err(TestError::Boom)
            })
            .await;

        assert!(matches!(result, Err(TestError::Boom)));
        assert!(coordinator.connection().committed().is_empty());
        assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_handler_replacement() {
        let (coordinator, _) = setup();
        coordinator.connection().fail_rollback.store(true, Ordering::SeqCst);

        let options =
            RunOptions::new().with_error_handler(|_: TestError| async { TestError::Custom });
        let result: Result<(), TestError> = coordinator
            .run(options, async |_tx: &mut Tx| Err(TestError::Boom))
            .await;

        assert!(matches!(result, Err(TestError::Custom)));
        assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Nesting
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_joined_units_share_one_transaction() {
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                coordinator
                    .run(RunOptions::joined(tx), async |tx: &mut Tx| {
                        tx.handle().insert("B");
                        Ok(())
                    })
                    .await
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(coordinator.connection().committed(), ["A", "B"]);
        assert_eq!(coordinator.connection().counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_nested_failure_rolls_back_everything() {
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                coordinator
                    .run(RunOptions::joined(tx), async |tx: &mut Tx| {
                        tx.handle().insert("B");
                        Err(TestError::Boom)
                    })
                    .await
            })
            .await;

        assert!(matches!(result, Err(TestError::Boom)));
        assert!(coordinator.connection().committed().is_empty());
        assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_nested_error_handler_replacement_propagates() {
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                let options =
                    RunOptions::joined(tx).with_error_handler(|_: TestError| async { TestError::Custom });
                coordinator
                    .run(options, async |tx: &mut Tx| {
                        tx.handle().insert("B");
                        Err(TestError::Boom)
                    })
                    .await
            })
            .await;

        assert!(matches!(result, Err(TestError::Custom)));
        assert!(coordinator.connection().committed().is_empty());
    }

    #[tokio::test]
    async fn test_swallowed_nested_failure_still_rolls_back() {
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                let inner: Result<(), TestError> = coordinator
                    .run(RunOptions::joined(tx), async |tx: &mut Tx| {
                        tx.handle().insert("B");
                        Err(TestError::Boom)
                    })
                    .await;
                assert!(inner.is_err());
                assert!(tx.is_rollback_only());
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(TestError::Repo(RepoError::RollbackOnly))));
        assert!(coordinator.connection().committed().is_empty());
        assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_cancelled_joined_run_rolls_back() {
        let (coordinator, _) = setup();

        let result: Result<usize, TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                let joined = coordinator.run(
                    RunOptions::joined(tx),
                    async |tx: &mut Tx| -> Result<(), TestError> {
                        tx.handle().insert("B1");
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        tx.handle().insert("B2");
                        Ok(())
                    },
                );
                let timed_out = tokio::time::timeout(Duration::from_millis(10), joined).await;

                assert!(timed_out.is_err());
                assert!(tx.is_rollback_only());
                assert!(tx.is_outermost());
                Ok(tx.depth())
            })
            .await;

        assert!(matches!(result, Err(TestError::Repo(RepoError::RollbackOnly))));
        assert!(coordinator.connection().committed().is_empty());
        assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_depth_tracks_nesting() {
        let (coordinator, _) = setup();

        let result: Result<Vec<usize>, TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                let mut depths = vec![tx.depth()];
                let outer_id = tx.id();
                coordinator
                    .run(RunOptions::joined(tx), async |tx: &mut Tx| -> Result<(), TestError> {
                        depths.push(tx.depth());
                        assert!(!tx.is_outermost());
                        assert_eq!(tx.id(), outer_id);
                        coordinator
                            .run(RunOptions::joined(tx), async |tx: &mut Tx| {
                                depths.push(tx.depth());
                                tx.handle().insert("C");
                                Ok(())
                            })
                            .await
                    })
                    .await?;
                depths.push(tx.depth());
                assert!(tx.is_outermost());
                Ok(depths)
            })
            .await;

        assert_eq!(result.unwrap(), [0, 1, 2, 0]);
        assert_eq!(coordinator.connection().committed(), ["C"]);
        assert_eq!(coordinator.connection().counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_joined_run_ignores_isolation() {
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                let options = RunOptions::joined(tx).with_isolation(IsolationLevel::Serializable);
                coordinator.run(options, async |_tx: &mut Tx| Ok(())).await
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(*coordinator.connection().isolation.lock().unwrap(), [None]);
    }

    #[tokio::test]
    async fn test_independent_runs_are_isolated() {
        let (coordinator, _) = setup();

        let first: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                Ok(())
            })
            .await;
        let second: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("B");
                Err(TestError::Boom)
            })
            .await;

        assert!(first.is_ok());
        assert!(second.is_err());
        assert_eq!(coordinator.connection().committed(), ["A"]);
        assert_eq!(coordinator.connection().counts(), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_unforwarded_nested_run_is_independent() {
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.handle().insert("A");
                coordinator
                    .run(RunOptions::new(), async |tx: &mut Tx| -> Result<(), TestError> {
                        tx.handle().insert("B");
                        Ok(())
                    })
                    .await?;
                Err(TestError::Boom)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(coordinator.connection().committed(), ["B"]);
        assert_eq!(coordinator.connection().counts(), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_inherit_without_transaction_begins_one() {
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::inherit(None), async |tx: &mut Tx| {
                assert!(tx.is_outermost());
                tx.handle().insert("A");
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(coordinator.connection().counts(), (1, 1, 0));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_events_publish_after_commit() {
        let (coordinator, bus) = setup();
        let mut rx = bus.subscribe();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.emit(DomainEvent::new("first", json!({})));
                coordinator
                    .run(RunOptions::joined(tx), async |tx: &mut Tx| -> Result<(), TestError> {
                        tx.emit(DomainEvent::new("second", json!({})));
                        Ok(())
                    })
                    .await?;
                assert_eq!(tx.pending_events().len(), 2);
                assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(rx.try_recv().unwrap().name, "first");
        assert_eq!(rx.try_recv().unwrap().name, "second");
    }

    #[tokio::test]
    async fn test_events_discarded_on_rollback() {
        let (coordinator, bus) = setup();
        let mut rx = bus.subscribe();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.emit(DomainEvent::new("first", json!({})));
                Err(TestError::Boom)
            })
            .await;

        assert!(result.is_err());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_run() {
        // No subscriber, so every publish fails.
        let (coordinator, _) = setup();

        let result: Result<(), TestError> = coordinator
            .run(RunOptions::new(), async |tx: &mut Tx| {
                tx.emit(DomainEvent::new("first", json!({})));
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(coordinator.connection().counts(), (1, 1, 0));
    }
}
