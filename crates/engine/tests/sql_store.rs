use std::sync::Arc;

use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    BalanceLedger, Currency, EngineError, Money, RateTable, SqlWalletStore, StaticRateProvider,
    TransactionKind, WalletFacade, WalletStore,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn insert_user(db: &DatabaseConnection, username: &str) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec![username.into(), "password".into()],
    ))
    .await
    .unwrap();
}

async fn store_with_db() -> (Arc<SqlWalletStore>, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    insert_user(&db, "alice").await;
    let store = Arc::new(SqlWalletStore::new(db.clone()));
    store.create_wallet("alice").await.unwrap();
    (store, db)
}

fn rates() -> Arc<StaticRateProvider> {
    Arc::new(StaticRateProvider::new(
        RateTable::new(
            Currency::Usd,
            [(Currency::Eur, dec!(0.9)), (Currency::Rub, dec!(90))],
        )
        .unwrap(),
    ))
}

#[tokio::test]
async fn new_wallet_has_every_currency_at_zero() {
    let (store, _db) = store_with_db().await;

    let wallet = store.wallet("alice").await.unwrap();

    assert_eq!(wallet.user_id, "alice");
    let currencies: Vec<Currency> = wallet.balances().map(|(c, _)| c).collect();
    assert_eq!(currencies.len(), Currency::ALL.len());
    assert!(wallet.balances().all(|(_, amount)| amount.is_zero()));
}

#[tokio::test]
async fn wallet_cannot_be_opened_twice() {
    let (store, _db) = store_with_db().await;
    assert_eq!(
        store.create_wallet("alice").await,
        Err(EngineError::ExistingKey("alice".to_string()))
    );
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let (store, _db) = store_with_db().await;
    assert_eq!(
        store.wallet("bob").await,
        Err(EngineError::UserNotFound("bob".to_string()))
    );

    let ledger = BalanceLedger::new(store);
    assert_eq!(
        ledger.apply_delta("bob", Currency::Usd, Money::new(100)).await,
        Err(EngineError::UserNotFound("bob".to_string()))
    );
}

#[tokio::test]
async fn deltas_are_persisted_with_their_journal() {
    let (store, _db) = store_with_db().await;
    let ledger = BalanceLedger::new(store.clone());

    ledger
        .apply_delta("alice", Currency::Rub, Money::new(10_000))
        .await
        .unwrap();
    ledger
        .apply_delta("alice", Currency::Rub, Money::new(-2_500))
        .await
        .unwrap();

    let wallet = store.wallet("alice").await.unwrap();
    assert_eq!(wallet.balance(Currency::Rub), Money::new(7_500));

    let journal = store.transactions("alice", 10).await.unwrap();
    assert_eq!(journal.len(), 2);
    assert_eq!(journal[0].kind, TransactionKind::Withdraw);
    assert_eq!(journal[0].legs.len(), 1);
    assert_eq!(journal[0].legs[0].amount, Money::new(-2_500));
    assert_eq!(journal[1].kind, TransactionKind::Deposit);
    assert_eq!(journal[1].rate, None);

    assert_eq!(store.transactions("alice", 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn insufficient_funds_rolls_back() {
    let (store, _db) = store_with_db().await;
    let ledger = BalanceLedger::new(store.clone());
    ledger
        .apply_delta("alice", Currency::Eur, Money::new(1_000))
        .await
        .unwrap();

    let res = ledger
        .apply_delta("alice", Currency::Eur, Money::new(-1_001))
        .await;

    assert!(matches!(res, Err(EngineError::InsufficientFunds(_))));
    let wallet = store.wallet("alice").await.unwrap();
    assert_eq!(wallet.balance(Currency::Eur), Money::new(1_000));
    assert_eq!(store.transactions("alice", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn exchange_is_recorded_as_one_transaction() {
    let (store, _db) = store_with_db().await;
    let facade = WalletFacade::builder(store.clone(), rates()).build();
    facade.deposit("alice", "USD", dec!(150)).await.unwrap();

    let exchanged = facade
        .exchange("alice", "usd", "eur", dec!(100))
        .await
        .unwrap();

    assert_eq!(exchanged.converted, Money::new(9_000));
    let wallet = store.wallet("alice").await.unwrap();
    assert_eq!(wallet.balance(Currency::Usd), Money::new(5_000));
    assert_eq!(wallet.balance(Currency::Eur), Money::new(9_000));

    let journal = store.transactions("alice", 10).await.unwrap();
    assert_eq!(journal.len(), 2);
    let exchange = &journal[0];
    assert_eq!(exchange.kind, TransactionKind::Exchange);
    assert_eq!(exchange.rate, Some(dec!(0.9)));
    let mut legs: Vec<(Currency, Money)> =
        exchange.legs.iter().map(|l| (l.currency, l.amount)).collect();
    legs.sort();
    assert_eq!(
        legs,
        vec![
            (Currency::Usd, Money::new(-10_000)),
            (Currency::Eur, Money::new(9_000)),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deltas_serialize() {
    let (store, _db) = store_with_db().await;
    let ledger = BalanceLedger::new(store.clone());
    ledger
        .apply_delta("alice", Currency::Usd, Money::new(100))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for amount in [50, -30, 50, -30, 50, -30] {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .apply_delta("alice", Currency::Usd, Money::new(amount))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let wallet = store.wallet("alice").await.unwrap();
    assert_eq!(wallet.balance(Currency::Usd), Money::new(160));
    assert_eq!(store.transactions("alice", 100).await.unwrap().len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exchange_and_withdraw_share_the_balance_check() {
    let (store, _db) = store_with_db().await;
    let facade = WalletFacade::builder(store.clone(), rates()).build();
    facade.deposit("alice", "USD", dec!(150)).await.unwrap();

    let exchange = {
        let facade = facade.clone();
        tokio::spawn(async move { facade.exchange("alice", "USD", "EUR", dec!(100)).await })
    };
    let withdraw = {
        let facade = facade.clone();
        tokio::spawn(async move { facade.withdraw("alice", "USD", dec!(100)).await })
    };
    let exchanged = exchange.await.unwrap();
    let withdrawn = withdraw.await.unwrap();

    assert_ne!(exchanged.is_ok(), withdrawn.is_ok());
    let wallet = store.wallet("alice").await.unwrap();
    assert_eq!(wallet.balance(Currency::Usd), Money::new(5_000));
    let expected_eur = if exchanged.is_ok() { 9_000 } else { 0 };
    assert_eq!(wallet.balance(Currency::Eur), Money::new(expected_eur));
    assert_eq!(store.transactions("alice", 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn balances_survive_reconnect() {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join(format!("wallet_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    {
        let db = Database::connect(&url).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        insert_user(&db, "alice").await;
        let store = Arc::new(SqlWalletStore::new(db.clone()));
        store.create_wallet("alice").await.unwrap();
        BalanceLedger::new(store)
            .apply_delta("alice", Currency::Eur, Money::new(4_242))
            .await
            .unwrap();
        db.close().await.unwrap();
    }

    let db = Database::connect(&url).await.unwrap();
    let store = SqlWalletStore::new(db.clone());
    let wallet = store.wallet("alice").await.unwrap();
    assert_eq!(wallet.balance(Currency::Eur), Money::new(4_242));
    assert_eq!(store.transactions("alice", 10).await.unwrap().len(), 1);

    db.close().await.unwrap();
    let _ = std::fs::remove_file(&path);
}
