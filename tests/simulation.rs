//! Simulation engine tests against an in-process chain.
#![allow(missing_docs)]

mod common;

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    network::TransactionBuilder,
    primitives::{Bytes, U256, bytes},
    rpc::types::{BlockTransactions, Filter, TransactionRequest},
    sol_types::SolCall,
};
use chrono::Utc;
use common::*;
use simstate::{
    chain::ChainClient,
    error::{IntegrityError, SimulationError},
    simulation::{BatchExecutor, QueueManager, SharedState, spawn_block_watcher},
    types::{
        BalanceKey, IERC20, MessageId, SignedMessage, SignedMessageRequest, SimulationState,
        TransactionId, Website,
    },
};
use std::{sync::Arc, time::Duration};

fn committed(state: SharedState) -> Arc<SimulationState> {
    state.expect("committed state")
}

fn nonces(state: &SimulationState) -> Vec<u64> {
    state.simulated_transactions.iter().map(|tx| tx.signed_transaction.body().nonce()).collect()
}

fn all_succeeded(state: &SimulationState) -> bool {
    state.simulated_transactions.iter().all(|tx| tx.batch_call_result.is_success())
}

fn message(id: u64, request: SignedMessageRequest) -> SignedMessage {
    SignedMessage {
        message_identifier: MessageId(id),
        signer: ALICE,
        request,
        website: Website::default(),
        created: Utc::now(),
    }
}

#[tokio::test]
async fn execution_is_order_sensitive() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.tokens.insert((TOKEN, ALICE), U256::from(100));
    });

    // Bob spends tokens he only receives afterwards.
    let state = setup
        .manager
        .set_simulation_transactions_and_signed_messages(
            None,
            vec![token_transfer(1, BOB, 0, CAROL, 50), token_transfer(2, ALICE, 0, BOB, 50)],
            vec![],
        )
        .await?;
    assert!(!state.simulated_transactions[0].batch_call_result.is_success());
    assert!(state.simulated_transactions[1].batch_call_result.is_success());

    let state = setup
        .manager
        .set_simulation_transactions_and_signed_messages(
            None,
            vec![token_transfer(2, ALICE, 0, BOB, 50), token_transfer(1, BOB, 0, CAROL, 50)],
            vec![],
        )
        .await?;
    assert!(all_succeeded(&state));

    let [alice, bob] = &state.simulated_transactions[..] else { panic!("expected two") };
    assert_eq!(balance_after(alice, BalanceKey::erc20(TOKEN, BOB)), Some(U256::from(50)));
    assert_eq!(balance_after(bob, BalanceKey::erc20(TOKEN, BOB)), Some(U256::ZERO));
    assert_eq!(balance_after(bob, BalanceKey::erc20(TOKEN, CAROL)), Some(U256::from(50)));
    assert_eq!(balance_after(alice, BalanceKey::erc20(TOKEN, CAROL)), None);

    Ok(())
}

#[tokio::test]
async fn balances_are_read_after_each_prefix() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });

    let state = setup
        .manager
        .append_transaction(None, native_transfer(1, ALICE, 0, BOB, ether(1)))
        .await?;
    let state = setup
        .manager
        .append_transaction(Some(&state), native_transfer(2, ALICE, 1, BOB, ether(2)))
        .await?;

    assert_eq!(state.simulated_transactions.len(), 2);
    assert!(all_succeeded(&state));

    let [first, second] = &state.simulated_transactions[..] else { panic!("expected two") };
    assert_eq!(balance_after(first, BalanceKey::native(BOB)), Some(ether(1)));
    assert_eq!(balance_after(second, BalanceKey::native(BOB)), Some(ether(3)));
    assert_eq!(balance_after(second, BalanceKey::native(ALICE)), Some(ether(7)));

    // one batch plus one balance aggregation per transaction, per append
    assert_eq!(setup.chain.simulate_calls(), (1 + 1) + (1 + 2));
    Ok(())
}

#[tokio::test]
async fn empty_queue_is_not_executed() -> eyre::Result<()> {
    let setup = Setup::new();

    let state =
        setup.manager.set_simulation_transactions_and_signed_messages(None, vec![], vec![]).await?;

    assert!(state.is_empty());
    assert_eq!(state.block_number, setup.chain.head_number());
    assert_eq!(state.chain_id, CHAIN_ID);
    assert_eq!(setup.chain.simulate_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn batch_length_mismatch_is_an_integrity_error() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(1));
    });
    setup.chain.truncate_results(true);

    let err = setup
        .manager
        .append_transaction(None, native_transfer(1, ALICE, 0, BOB, ether(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Integrity(IntegrityError::BatchLengthMismatch { expected: 1, actual: 0 })
    ));
    assert!(!err.is_transient());
    Ok(())
}

#[tokio::test]
async fn parent_without_base_fee_is_an_integrity_error() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(1));
    });
    setup.chain.set_base_fee(None);

    let err = setup
        .manager
        .append_transaction(None, native_transfer(1, ALICE, 0, BOB, ether(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, SimulationError::Integrity(IntegrityError::MissingBaseFee(100))));
    assert!(!err.is_transient());
    assert_eq!(setup.chain.simulate_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn unreadable_balances_do_not_abort_the_recompute() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.tokens.insert((TOKEN, ALICE), U256::from(100));
        world.unreadable.insert(TOKEN);
    });

    let state =
        setup.manager.append_transaction(None, token_transfer(1, ALICE, 0, BOB, 40)).await?;

    let tx = &state.simulated_transactions[0];
    assert!(tx.batch_call_result.is_success());
    let bob = tx
        .token_balances_after
        .iter()
        .find(|balance| balance.key() == BalanceKey::erc20(TOKEN, BOB))
        .expect("tracked balance");
    assert_eq!(bob.balance, None);
    assert_eq!(balance_after(tx, BalanceKey::native(ALICE)), Some(U256::ZERO));
    Ok(())
}

#[tokio::test]
async fn state_of_another_chain_is_discarded() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let state = setup
        .manager
        .append_transaction(None, native_transfer(1, ALICE, 0, BOB, ether(1)))
        .await?;

    let other = Arc::new(MockChain::new(CHAIN_ID + 1));
    other.with_world(|world| {
        world.native.insert(BOB, ether(10));
    });
    let manager = QueueManager::new(BatchExecutor::new(ChainClient::new(other), false));

    let refreshed = manager.refresh_simulation_state(&state).await?;
    assert_eq!(refreshed, state);

    let transfer = native_transfer(2, BOB, 0, CAROL, ether(1));
    let appended = manager.append_transaction(Some(&state), transfer).await?;
    assert_eq!(appended.chain_id, CHAIN_ID + 1);
    assert_eq!(appended.simulated_transactions.len(), 1);
    assert_eq!(appended.simulated_transactions[0].transaction_identifier, TransactionId(2));
    Ok(())
}

#[tokio::test]
async fn refresh_without_new_block_only_bumps_timestamp() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let state = setup
        .manager
        .append_transaction(None, native_transfer(1, ALICE, 0, BOB, ether(1)))
        .await?;
    let calls = setup.chain.simulate_calls();

    let first = setup.manager.refresh_simulation_state(&state).await?;
    let second = setup.manager.refresh_simulation_state(&first).await?;

    assert_eq!(setup.chain.simulate_calls(), calls);
    assert!(second.simulation_conducted_timestamp >= state.simulation_conducted_timestamp);
    assert_eq!(
        SimulationState {
            simulation_conducted_timestamp: state.simulation_conducted_timestamp,
            ..second
        },
        state
    );
    Ok(())
}

#[tokio::test]
async fn refresh_raises_max_fees_below_twice_the_base_fee() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let state = setup
        .manager
        .append_transaction(None, native_transfer(1, ALICE, 0, BOB, ether(1)))
        .await?;
    let body = state.simulated_transactions[0].signed_transaction.body();
    assert_eq!(body.max_fee_per_gas(), 100 * GWEI);

    setup.chain.set_base_fee(Some((60 * GWEI) as u64));
    setup.chain.mine(|_| {});
    let refreshed = setup.manager.refresh_simulation_state(&state).await?;

    assert_eq!(refreshed.block_number, state.block_number + 1);
    assert_eq!(refreshed.block_base_fee_per_gas, 60 * GWEI);
    let body = refreshed.simulated_transactions[0].signed_transaction.body();
    assert_eq!(body.max_fee_per_gas(), 2 * 60 * GWEI + GWEI);
    assert_ne!(refreshed.simulated_transactions[0].hash(), state.simulated_transactions[0].hash());
    Ok(())
}

#[tokio::test]
async fn nonce_conflicts_are_reconciled_on_append() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.nonces.insert(ALICE, 5);
        world.native.insert(ALICE, ether(10));
    });
    let service = setup.spawn();

    let state =
        committed(service.append_transaction(native_transfer(1, ALICE, 0, BOB, ether(1))).await?);
    assert_eq!(nonces(&state), vec![5]);
    assert!(all_succeeded(&state));

    let state =
        committed(service.append_transaction(native_transfer(2, ALICE, 9, BOB, ether(1))).await?);
    assert_eq!(nonces(&state), vec![5, 6]);
    assert!(all_succeeded(&state));
    Ok(())
}

#[tokio::test]
async fn raw_transactions_keep_their_nonce() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let service = setup.spawn();

    service.append_transaction(raw_transfer(1, ALICE, 0, BOB, ether(1))).await?;
    let state =
        committed(service.append_transaction(native_transfer(2, ALICE, 4, BOB, ether(1))).await?);

    assert_eq!(nonces(&state), vec![0, 1]);
    assert!(all_succeeded(&state));
    Ok(())
}

#[tokio::test]
async fn removal_renumbers_later_transactions() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.nonces.insert(ALICE, 5);
        world.native.insert(ALICE, ether(10));
    });
    let service = setup.spawn();

    service
        .set_simulation_transactions_and_signed_messages(
            vec![
                native_transfer(1, ALICE, 5, BOB, ether(1)),
                native_transfer(2, ALICE, 6, BOB, ether(1)),
                native_transfer(3, ALICE, 7, CAROL, ether(1)),
            ],
            vec![],
        )
        .await?;

    let calls = setup.chain.simulate_calls();
    let unchanged = committed(service.remove_transaction(TransactionId(42)).await?);
    assert_eq!(unchanged.simulated_transactions.len(), 3);
    assert_eq!(setup.chain.simulate_calls(), calls);

    let state = committed(service.remove_transaction(TransactionId(2)).await?);
    assert_eq!(nonces(&state), vec![5, 6]);
    assert_eq!(
        state.simulated_transactions.iter().map(|tx| tx.transaction_identifier).collect::<Vec<_>>(),
        vec![TransactionId(1), TransactionId(3)]
    );
    assert!(all_succeeded(&state));
    Ok(())
}

#[tokio::test]
async fn refresh_follows_nonces_mined_elsewhere() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let service = setup.spawn();
    service.append_transaction(native_transfer(1, ALICE, 0, BOB, ether(1))).await?;

    setup.chain.mine(|world| {
        world.nonces.insert(ALICE, 1);
    });
    let state = committed(service.refresh().await?);

    assert_eq!(state.block_number, 101);
    assert_eq!(nonces(&state), vec![1]);
    assert!(all_succeeded(&state));
    Ok(())
}

#[tokio::test]
async fn prepend_queue_executes_first() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let service = setup.spawn();

    service.append_transaction(native_transfer(1, BOB, 0, CAROL, ether(1))).await?;
    let state = committed(
        service
            .set_prepend_transactions_queue(vec![raw_transfer(9, ALICE, 0, BOB, ether(2))])
            .await?,
    );

    assert_eq!(state.prepend_transactions_queue.len(), 1);
    assert_eq!(state.simulated_transactions.len(), 2);
    assert_eq!(state.simulated_transactions[0].transaction_identifier, TransactionId(9));
    assert_eq!(state.user_transactions().len(), 1);
    assert!(all_succeeded(&state));
    Ok(())
}

#[tokio::test]
async fn transient_failures_keep_the_committed_state() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let service = setup.spawn();
    let committed_state =
        committed(service.append_transaction(native_transfer(1, ALICE, 0, BOB, ether(1))).await?);

    setup.chain.fail_simulate(true);
    let err = service
        .append_transaction(native_transfer(2, ALICE, 1, BOB, ether(1)))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(service.current_state(), Some(committed_state));
    Ok(())
}

#[tokio::test]
async fn reset_supersedes_in_flight_recompute() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    setup.chain.delay_simulate(Some(Duration::from_millis(200)));
    let service = setup.spawn();

    let pending = tokio::spawn({
        let service = service.clone();
        async move { service.append_transaction(native_transfer(1, ALICE, 0, BOB, ether(1))).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    service.reset().await?;

    assert!(matches!(pending.await?, Err(SimulationError::Superseded)));
    assert!(service.current_state().is_none());
    Ok(())
}

#[tokio::test]
async fn changing_chains_drops_the_simulation() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let service = setup.spawn();
    service.append_transaction(native_transfer(1, ALICE, 0, BOB, ether(1))).await?;

    let other = Arc::new(MockChain::new(1));
    other.with_world(|world| {
        world.native.insert(BOB, ether(10));
    });
    service
        .change_chain(QueueManager::new(BatchExecutor::new(ChainClient::new(other), false)))
        .await?;
    assert!(service.current_state().is_none());

    let state =
        committed(service.append_transaction(native_transfer(2, BOB, 0, CAROL, ether(1))).await?);
    assert_eq!(state.chain_id, 1);
    assert_eq!(state.simulated_transactions.len(), 1);
    Ok(())
}

#[tokio::test]
async fn new_blocks_refresh_the_simulation() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    let service = setup.spawn();
    let watcher = spawn_block_watcher(service.clone(), Duration::from_millis(10), true);
    service.append_transaction(native_transfer(1, ALICE, 0, BOB, ether(1))).await?;

    setup.chain.mine(|_| {});
    let mut states = service.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        while states.borrow_and_update().as_ref().is_none_or(|state| state.block_number != 101) {
            states.changed().await.unwrap();
        }
    })
    .await?;

    watcher.abort();
    Ok(())
}

#[tokio::test]
async fn signed_messages_are_part_of_the_simulation() -> eyre::Result<()> {
    let setup = Setup::new();
    let service = setup.spawn();

    let request = SignedMessageRequest::PersonalSign { message: Bytes::from_static(b"hello") };
    let state = committed(service.add_signed_message(message(1, request)).await?);
    assert_eq!(state.signed_messages.len(), 1);
    assert!(state.is_empty());
    assert_eq!(setup.chain.simulate_calls(), 1);

    let err = service
        .add_signed_message(message(2, SignedMessageRequest::EthSign { data: bytes!("01") }))
        .await
        .unwrap_err();
    assert!(matches!(err, SimulationError::NotImplemented(_)));

    let state = committed(service.remove_signed_message(MessageId(1)).await?);
    assert!(state.signed_messages.is_empty());
    assert_eq!(setup.chain.simulate_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn reads_are_answered_from_the_synthetic_block() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
        world.tokens.insert((TOKEN, ALICE), U256::from(100));
    });
    let (service, router) = setup.spawn_router();
    let state = committed(
        service
            .set_simulation_transactions_and_signed_messages(
                vec![
                    native_transfer(1, ALICE, 0, BOB, ether(1)),
                    token_transfer(2, ALICE, 1, BOB, 40),
                ],
                vec![],
            )
            .await?,
    );

    assert_eq!(router.get_block_number().await?, 101);
    assert_eq!(router.get_balance(BOB, BlockId::latest()).await?, ether(1));
    assert_eq!(router.get_balance(BOB, BlockId::number(100)).await?, U256::ZERO);
    assert_eq!(router.get_balance(BOB, BlockId::number(99)).await?, U256::ZERO);
    assert_eq!(router.get_transaction_count(ALICE, BlockId::latest()).await?, 2);
    assert_eq!(router.get_transaction_count(ALICE, BlockId::number(100)).await?, 0);

    let block = router.get_block(BlockId::latest(), false).await?.expect("synthetic block");
    assert_eq!(block.header.inner.number, 101);
    assert_eq!(block.header.inner.parent_hash, state.block_hash);
    assert_eq!(block.header.inner.base_fee_per_gas, Some(10 * GWEI as u64));
    let BlockTransactions::Hashes(hashes) = &block.transactions else { panic!("expected hashes") };
    let expected = state.simulated_transactions.iter().map(|tx| tx.hash()).collect::<Vec<_>>();
    assert_eq!(hashes, &expected);
    let by_hash =
        router.get_block(block.header.hash.into(), false).await?.expect("synthetic block");
    assert_eq!(by_hash.header.hash, block.header.hash);
    assert!(router.get_block(BlockId::number(101), false).await?.is_some());
    assert!(router.get_block(BlockId::number(150), false).await?.is_none());

    let hash = state.simulated_transactions[1].hash();
    let receipt = router.get_transaction_receipt(hash).await?.expect("simulated receipt");
    assert_eq!(receipt.block_number, Some(101));
    assert_eq!(receipt.transaction_index, Some(1));
    assert_eq!(receipt.gas_used, TOKEN_TRANSFER_GAS);
    let transaction = router.get_transaction_by_hash(hash).await?.expect("simulated transaction");
    assert_eq!(transaction.block_number, Some(101));

    let filter = Filter::new().address(TOKEN).from_block(100u64).to_block(BlockNumberOrTag::Latest);
    let logs = router.get_logs(&filter).await?;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].block_number, Some(101));
    assert_eq!(logs[0].transaction_hash, Some(hash));
    Ok(())
}

#[tokio::test]
async fn identical_bodies_of_different_senders_are_distinct() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
        world.native.insert(BOB, ether(10));
    });
    let (service, router) = setup.spawn_router();
    let state = committed(
        service
            .set_simulation_transactions_and_signed_messages(
                vec![
                    native_transfer(1, ALICE, 0, CAROL, ether(1)),
                    native_transfer(2, BOB, 0, CAROL, ether(1)),
                ],
                vec![],
            )
            .await?,
    );

    let [alice, bob] = &state.simulated_transactions[..] else { panic!("expected two") };
    assert_eq!(alice.signed_transaction.body(), bob.signed_transaction.body());
    assert_ne!(alice.hash(), bob.hash());

    let receipt = router.get_transaction_receipt(bob.hash()).await?.expect("simulated receipt");
    assert_eq!(receipt.from, BOB);
    assert_eq!(receipt.transaction_index, Some(1));
    let transaction =
        router.get_transaction_by_hash(bob.hash()).await?.expect("simulated transaction");
    assert_eq!(transaction.inner.signer(), BOB);
    assert_eq!(transaction.transaction_index, Some(1));
    Ok(())
}

#[tokio::test]
async fn failed_balance_reads_fall_back_to_the_chain() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(10));
    });
    // the balance read after the second transaction fails
    setup.chain.fail_reads_from(Some(2));
    let (service, router) = setup.spawn_router();
    let state = committed(
        service
            .set_simulation_transactions_and_signed_messages(
                vec![
                    native_transfer(1, ALICE, 0, BOB, ether(1)),
                    native_transfer(2, ALICE, 1, BOB, ether(2)),
                ],
                vec![],
            )
            .await?,
    );

    let [first, second] = &state.simulated_transactions[..] else { panic!("expected two") };
    assert_eq!(balance_after(first, BalanceKey::native(BOB)), Some(ether(1)));
    assert!(second.token_balances_after.iter().all(|balance| balance.balance.is_none()));

    assert_eq!(router.get_balance(BOB, BlockId::latest()).await?, U256::ZERO);
    assert_eq!(router.get_balance(ALICE, BlockId::latest()).await?, ether(10));
    Ok(())
}

#[tokio::test]
async fn auxiliary_calls_run_after_the_queue() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.tokens.insert((TOKEN, ALICE), U256::from(100));
        world.code.insert(TOKEN, bytes!("6000"));
    });
    let (service, router) = setup.spawn_router();
    service.append_transaction(token_transfer(1, ALICE, 0, BOB, 40)).await?;

    let balance_of = TransactionRequest::default()
        .with_to(TOKEN)
        .with_input(IERC20::balanceOfCall { owner: BOB }.abi_encode());
    let output = router.call(balance_of, BlockId::latest()).await?;
    assert_eq!(IERC20::balanceOfCall::abi_decode_returns(&output)?, U256::from(40));

    let transfer = |from| {
        TransactionRequest::default()
            .with_from(from)
            .with_to(TOKEN)
            .with_input(IERC20::transferCall { to: CAROL, amount: U256::from(10) }.abi_encode())
    };
    let gas = router.estimate_gas(transfer(BOB), BlockId::latest()).await?;
    assert_eq!(gas, TOKEN_TRANSFER_GAS * 125 / 100);

    let err = router.call(transfer(CAROL), BlockId::latest()).await.unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Reverted { reason: Some(ref reason), .. }
            if reason.contains("exceeds balance")
    ));

    assert_eq!(router.get_code(TOKEN, BlockId::latest()).await?, bytes!("6000"));
    Ok(())
}

#[tokio::test]
async fn queries_without_simulation_go_to_the_chain() -> eyre::Result<()> {
    let setup = Setup::new();
    setup.chain.with_world(|world| {
        world.native.insert(ALICE, ether(3));
        world.tokens.insert((TOKEN, ALICE), U256::from(100));
    });
    let (_service, router) = setup.spawn_router();

    assert_eq!(router.get_block_number().await?, 100);
    assert_eq!(router.get_balance(ALICE, BlockId::latest()).await?, ether(3));
    assert_eq!(router.get_transaction_count(ALICE, BlockId::latest()).await?, 0);
    assert_eq!(setup.chain.simulate_calls(), 0);

    let balance_of = TransactionRequest::default()
        .with_to(TOKEN)
        .with_input(IERC20::balanceOfCall { owner: ALICE }.abi_encode());
    let output = router.call(balance_of, BlockId::latest()).await?;
    assert_eq!(IERC20::balanceOfCall::abi_decode_returns(&output)?, U256::from(100));
    assert_eq!(setup.chain.simulate_calls(), 1);
    Ok(())
}
