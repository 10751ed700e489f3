//! Partial-failure, timeout, and concurrency tests
//!
//! `FlakyStore` wraps the SQLite store and fails or stalls per-record
//! updates for selected identities, simulating one half of a paired write
//! not landing.

use async_trait::async_trait;
use quire_domain::traits::IdentityStore;
use quire_domain::{
    Asymmetry, Identity, NewIdentity, PairState, PublicProfile, RelationSet, SetMutation, UserId,
};
use quire_social::{ErrorKind, RelationshipService, ServiceConfig, SocialError};
use quire_store::{SqliteStore, StoreError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct FlakyStore {
    inner: SqliteStore,
    failing: Arc<Mutex<HashSet<UserId>>>,
    stalling: Arc<Mutex<HashSet<UserId>>>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::new(":memory:").unwrap(),
            failing: Arc::default(),
            stalling: Arc::default(),
        }
    }

    fn fail_updates_for(&self, id: UserId) {
        self.failing.lock().unwrap().insert(id);
    }

    fn stall_updates_for(&self, id: UserId) {
        self.stalling.lock().unwrap().insert(id);
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.stalling.lock().unwrap().clear();
    }
}

#[async_trait]
impl IdentityStore for FlakyStore {
    type Error = StoreError;

    async fn get(&self, id: UserId) -> Result<Option<Identity>, Self::Error> {
        self.inner.get(id).await
    }

    async fn apply(&self, id: UserId, mutations: &[SetMutation]) -> Result<(), Self::Error> {
        let fail = self.failing.lock().unwrap().contains(&id);
        let stall = self.stalling.lock().unwrap().contains(&id);
        if fail {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        if stall {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.inner.apply(id, mutations).await
    }

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<PublicProfile>, Self::Error> {
        self.inner.find_many(ids).await
    }

    async fn create(&self, identity: NewIdentity) -> Result<Identity, Self::Error> {
        self.inner.create(identity).await
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<PublicProfile>, Self::Error> {
        self.inner.search(text, limit).await
    }
}

async fn setup(
    config: ServiceConfig,
) -> (RelationshipService<FlakyStore>, FlakyStore, UserId, UserId) {
    let store = FlakyStore::new();
    let alice = store.create(NewIdentity::new("Alice")).await.unwrap().id;
    let bob = store.create(NewIdentity::new("Bob")).await.unwrap().id;
    (
        RelationshipService::new(store.clone(), config),
        store,
        alice,
        bob,
    )
}

#[tokio::test]
async fn test_half_applied_request_is_reported_and_repaired() {
    let (service, store, alice, bob) = setup(ServiceConfig::default()).await;
    store.fail_updates_for(bob);

    let err = service.request_connection(alice, bob).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    // No store detail leaks to the caller
    assert_eq!(err, SocialError::Internal("store unavailable".to_string()));

    let report = service.inspect_pair(alice, bob).await.unwrap();
    assert_eq!(report.settled, None);
    assert_eq!(
        report.asymmetries,
        vec![Asymmetry::DanglingOutgoing {
            requester: alice,
            recipient: bob,
        }]
    );

    store.heal();
    let state = service.reconcile_pair(alice, bob).await.unwrap();
    assert_eq!(state, PairState::pending(alice, bob));
    assert_eq!(service.list_incoming(bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retrying_accept_heals_half_applied_accept() {
    let (service, store, alice, bob) = setup(ServiceConfig::default()).await;
    service.request_connection(alice, bob).await.unwrap();

    // Bob's record updates, Alice's does not
    store.fail_updates_for(alice);
    let err = service.accept_connection(bob, alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    let bob_record = store.get(bob).await.unwrap().unwrap();
    assert!(bob_record.contains(RelationSet::Friends, alice));
    let alice_record = store.get(alice).await.unwrap().unwrap();
    assert!(!alice_record.contains(RelationSet::Friends, bob));
    assert!(alice_record.contains(RelationSet::OutgoingRequests, bob));

    // Retry observes the half-applied state and completes it
    store.heal();
    assert_eq!(
        service.accept_connection(bob, alice).await,
        Err(SocialError::AlreadyFriendsConflict)
    );

    let report = service.inspect_pair(alice, bob).await.unwrap();
    assert_eq!(report.settled, Some(PairState::Friends));
    assert_eq!(service.list_friends(alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retrying_accept_when_requester_side_landed() {
    let (service, store, alice, bob) = setup(ServiceConfig::default()).await;
    service.request_connection(alice, bob).await.unwrap();

    // Alice's record updates, Bob's does not
    store.fail_updates_for(bob);
    assert!(service.accept_connection(bob, alice).await.is_err());
    store.heal();

    let bob_record = store.get(bob).await.unwrap().unwrap();
    assert!(bob_record.contains(RelationSet::IncomingRequests, alice));
    assert!(!bob_record.contains(RelationSet::Friends, alice));

    assert_eq!(
        service.accept_connection(bob, alice).await,
        Err(SocialError::AlreadyFriendsConflict)
    );
    let report = service.inspect_pair(alice, bob).await.unwrap();
    assert_eq!(report.settled, Some(PairState::Friends));
}

#[tokio::test]
async fn test_half_applied_remove_reconciles_to_none() {
    let (service, store, alice, bob) = setup(ServiceConfig::default()).await;
    service.request_connection(alice, bob).await.unwrap();
    service.accept_connection(bob, alice).await.unwrap();

    store.fail_updates_for(bob);
    assert!(service.remove_connection(alice, bob).await.is_err());
    store.heal();

    let report = service.inspect_pair(alice, bob).await.unwrap();
    assert_eq!(
        report.asymmetries,
        vec![Asymmetry::OneSidedFriend {
            holder: bob,
            missing: alice,
        }]
    );

    assert_eq!(
        service.reconcile_pair(alice, bob).await.unwrap(),
        PairState::None
    );
    // A settled pair is left alone
    assert_eq!(
        service.reconcile_pair(alice, bob).await.unwrap(),
        PairState::None
    );
}

#[tokio::test]
async fn test_retrying_remove_is_safe() {
    let (service, store, alice, bob) = setup(ServiceConfig::default()).await;
    service.request_connection(alice, bob).await.unwrap();
    service.accept_connection(bob, alice).await.unwrap();

    store.fail_updates_for(alice);
    assert!(service.remove_connection(alice, bob).await.is_err());
    store.heal();
    service.remove_connection(alice, bob).await.unwrap();

    let report = service.inspect_pair(alice, bob).await.unwrap();
    assert_eq!(report.settled, Some(PairState::None));
}

#[tokio::test]
async fn test_store_timeout_is_internal() {
    let config = ServiceConfig::default().with_store_timeout(Duration::from_millis(50));
    let (service, store, alice, bob) = setup(config).await;
    store.stall_updates_for(bob);

    let err = service.request_connection(alice, bob).await.unwrap_err();
    assert_eq!(err, SocialError::Internal("store timed out".to_string()));

    // Outcome is unknown to the caller; re-derive status before retrying
    store.heal();
    let status = service.status(alice, bob).await.unwrap();
    assert_eq!(status.as_str(), "request_sent");
    assert_eq!(
        service.request_connection(alice, bob).await,
        Err(SocialError::RequestAlreadySent)
    );
}

#[tokio::test]
async fn test_locked_database_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quire.db");
    let store = SqliteStore::new(&path).unwrap();
    let alice = store.create(NewIdentity::new("Alice")).await.unwrap().id;
    let bob = store.create(NewIdentity::new("Bob")).await.unwrap().id;
    let config = ServiceConfig::default().with_store_timeout(Duration::from_millis(50));
    let service = RelationshipService::new(store, config);

    let holder = rusqlite::Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let started = Instant::now();
    let err = service.request_connection(alice, bob).await.unwrap_err();
    assert_eq!(err, SocialError::Internal("store timed out".to_string()));
    assert!(started.elapsed() < Duration::from_secs(1));

    // Nothing was written before the read timed out
    holder.execute_batch("ROLLBACK").unwrap();
    let record = service.store().get(bob).await.unwrap().unwrap();
    assert!(record.incoming_requests().is_empty());
}

#[tokio::test]
async fn test_reconcile_rejects_self_pair() {
    let (service, _store, alice, _bob) = setup(ServiceConfig::default()).await;
    let err = service.reconcile_pair(alice, alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_to_one_target() {
    let store = SqliteStore::new(":memory:").unwrap();
    let target = store.create(NewIdentity::new("Target")).await.unwrap().id;
    let mut senders = Vec::new();
    for i in 0..16 {
        senders.push(store.create(NewIdentity::new(format!("Sender {}", i))).await.unwrap().id);
    }
    let service = Arc::new(RelationshipService::new(store, ServiceConfig::default()));

    let mut handles = Vec::new();
    for sender in senders.clone() {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.request_connection(sender, target).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let incoming = service.list_incoming(target).await.unwrap();
    assert_eq!(incoming.len(), senders.len());
    for sender in senders {
        let report = service.inspect_pair(sender, target).await.unwrap();
        assert_eq!(report.settled, Some(PairState::pending(sender, target)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_crossed_requests_settle_after_reconcile() {
    let store = SqliteStore::new(":memory:").unwrap();
    let alice = store.create(NewIdentity::new("Alice")).await.unwrap().id;
    let bob = store.create(NewIdentity::new("Bob")).await.unwrap().id;
    let service = Arc::new(RelationshipService::new(store, ServiceConfig::default()));

    let (a, b) = {
        let s1 = Arc::clone(&service);
        let s2 = Arc::clone(&service);
        tokio::join!(
            tokio::spawn(async move { s1.request_connection(alice, bob).await }),
            tokio::spawn(async move { s2.request_connection(bob, alice).await }),
        )
    };
    let (a, b) = (a.unwrap(), b.unwrap());

    // At least one request lands; a racing pair may both land
    assert!(a.is_ok() || b.is_ok());
    for result in [&a, &b] {
        if let Err(e) = result {
            assert_eq!(*e, SocialError::ReciprocalRequestExists);
        }
    }

    let state = service.reconcile_pair(alice, bob).await.unwrap();
    if a.is_ok() && b.is_ok() {
        assert_eq!(state, PairState::Friends);
    } else {
        assert!(matches!(state, PairState::Pending { .. }));
    }
    let report = service.inspect_pair(alice, bob).await.unwrap();
    assert_eq!(report.settled, Some(state));
}
