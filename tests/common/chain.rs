//! In-process [`ChainReader`] that models `eth_simulateV1` for a tiny world of native balances,
//! nonces, ERC-20 balances and contract code.

use alloy::{
    consensus::Header as ConsensusHeader,
    eips::{BlockId, BlockNumberOrTag},
    primitives::{Address, B256, Bytes, ChainId, Log as PrimitiveLog, TxHash, U256},
    rpc::types::{
        Block, BlockTransactions, Filter, Header, Log, Transaction, TransactionReceipt,
        TransactionRequest,
        simulate::{SimCallResult, SimulatePayload, SimulatedBlock},
    },
    sol_types::{Revert, SolCall, SolError, SolEvent, SolValue},
    transports::{TransportErrorKind, TransportResult},
};
use async_trait::async_trait;
use simstate::{
    chain::ChainReader,
    constants::{CODE_READER_ADDRESS, ETH_ADDRESS, MULTICALL3_ADDRESS},
    types::{IERC20, IMulticall3, NONCE_TOO_HIGH_CODE, NONCE_TOO_LOW_CODE},
};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Gas used by a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;
/// Gas used by an ERC-20 transfer.
pub const TOKEN_TRANSFER_GAS: u64 = 50_000;
/// Gas used by any read-only call.
pub const READ_GAS: u64 = 30_000;

const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const GAS_LIMIT: u64 = 30_000_000;

/// Accounts of the mock chain.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub nonces: HashMap<Address, u64>,
    pub native: HashMap<Address, U256>,
    pub tokens: HashMap<(Address, Address), U256>,
    pub code: HashMap<Address, Bytes>,
    /// Contracts that emit ERC-20 events but revert on `balanceOf`.
    pub unreadable: HashSet<Address>,
    /// Whether every balance read of the current call fails.
    reads_fail: bool,
}

impl World {
    fn nonce(&self, address: Address) -> u64 {
        self.nonces.get(&address).copied().unwrap_or_default()
    }

    fn native(&self, address: Address) -> U256 {
        self.native.get(&address).copied().unwrap_or_default()
    }

    fn token(&self, token: Address, owner: Address) -> U256 {
        self.tokens.get(&(token, owner)).copied().unwrap_or_default()
    }

    /// Executes `call` like `eth_simulateV1` with `traceTransfers` enabled.
    fn execute(&mut self, call: &TransactionRequest) -> SimCallResult {
        let from = call.from.unwrap_or_default();
        let expected = self.nonce(from);
        match call.nonce {
            Some(nonce) if nonce < expected => {
                return failure(NONCE_TOO_LOW_CODE, "nonce too low", Bytes::new());
            }
            Some(nonce) if nonce > expected => {
                return failure(NONCE_TOO_HIGH_CODE, "nonce too high", Bytes::new());
            }
            _ => {}
        }
        *self.nonces.entry(from).or_default() += 1;

        let to = call.to.and_then(|kind| kind.to().copied()).unwrap_or_default();
        let input = call.input.input().cloned().unwrap_or_default();
        let value = call.value.unwrap_or_default();

        let mut logs = Vec::new();
        if !value.is_zero() {
            if self.native(from) < value {
                return failure(-32000, "insufficient funds for transfer", Bytes::new());
            }
            *self.native.entry(from).or_default() -= value;
            *self.native.entry(to).or_default() += value;
            logs.push(transfer_log(ETH_ADDRESS, from, to, value));
        }

        if to == MULTICALL3_ADDRESS
            && let Ok(call) = IMulticall3::aggregate3Call::abi_decode(&input)
        {
            let results = call.calls.iter().map(|call| self.read(call)).collect::<Vec<_>>();
            return success(READ_GAS, results.abi_encode().into(), logs);
        }
        if to == CODE_READER_ADDRESS && input.len() == 32 {
            let address = Address::from_word(B256::from_slice(&input));
            return success(READ_GAS, self.code.get(&address).cloned().unwrap_or_default(), logs);
        }
        if let Ok(transfer) = IERC20::transferCall::abi_decode(&input) {
            let balance = self.token(to, from);
            if balance < transfer.amount {
                let revert = Revert { reason: "ERC20: transfer amount exceeds balance".into() };
                let revert = revert.abi_encode();
                return failure(3, "execution reverted", revert.into());
            }
            *self.tokens.entry((to, from)).or_default() -= transfer.amount;
            *self.tokens.entry((to, transfer.to)).or_default() += transfer.amount;
            logs.push(transfer_log(to, from, transfer.to, transfer.amount));
            return success(TOKEN_TRANSFER_GAS, true.abi_encode().into(), logs);
        }
        if let Ok(call) = IERC20::balanceOfCall::abi_decode(&input) {
            return success(READ_GAS, self.token(to, call.owner).abi_encode().into(), logs);
        }

        success(TRANSFER_GAS, Bytes::new(), logs)
    }

    /// Answers a sub-call of `aggregate3`.
    fn read(&self, call: &IMulticall3::Call3) -> IMulticall3::Result {
        let data = if self.reads_fail || self.unreadable.contains(&call.target) {
            None
        } else if call.target == MULTICALL3_ADDRESS {
            IMulticall3::getEthBalanceCall::abi_decode(&call.callData)
                .ok()
                .map(|call| self.native(call.addr))
        } else {
            IERC20::balanceOfCall::abi_decode(&call.callData)
                .ok()
                .map(|balance| self.token(call.target, balance.owner))
        };
        match data {
            Some(balance) => {
                IMulticall3::Result { success: true, returnData: balance.abi_encode().into() }
            }
            None => IMulticall3::Result { success: false, returnData: Bytes::new() },
        }
    }
}

fn transfer_log(token: Address, from: Address, to: Address, amount: U256) -> Log {
    let event = IERC20::Transfer { from, to, amount };
    Log {
        inner: PrimitiveLog { address: token, data: event.encode_log_data() },
        ..Default::default()
    }
}

fn success(gas_used: u64, return_data: Bytes, logs: Vec<Log>) -> SimCallResult {
    SimCallResult { return_data, logs, gas_used, status: true, error: None }
}

fn failure(code: i64, message: &str, return_data: Bytes) -> SimCallResult {
    let error = serde_json::from_value(serde_json::json!({ "code": code, "message": message }))
        .expect("valid simulate error");
    SimCallResult { return_data, logs: Vec::new(), gas_used: TRANSFER_GAS, status: false, error }
}

#[derive(Debug)]
struct Head {
    number: u64,
    base_fee: Option<u64>,
    gas_used: u64,
    world: World,
}

/// Deterministic chain double.
#[derive(Debug)]
pub struct MockChain {
    chain_id: ChainId,
    head: Mutex<Head>,
    simulate_calls: AtomicUsize,
    fail_simulate: AtomicBool,
    truncate_results: AtomicBool,
    simulate_delay: Mutex<Option<Duration>>,
    fail_reads_from: Mutex<Option<usize>>,
}

impl MockChain {
    /// A chain at block 100 with a base fee of 10 gwei and half full blocks.
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            head: Mutex::new(Head {
                number: 100,
                base_fee: Some(10_000_000_000),
                gas_used: GAS_LIMIT / 2,
                world: World::default(),
            }),
            simulate_calls: AtomicUsize::new(0),
            fail_simulate: AtomicBool::new(false),
            truncate_results: AtomicBool::new(false),
            simulate_delay: Mutex::new(None),
            fail_reads_from: Mutex::new(None),
        }
    }

    /// Mutates the accounts of the current head.
    pub fn with_world(&self, f: impl FnOnce(&mut World)) {
        f(&mut self.head.lock().unwrap().world);
    }

    /// Produces a new block, applying `f` to the accounts.
    pub fn mine(&self, f: impl FnOnce(&mut World)) {
        let mut head = self.head.lock().unwrap();
        head.number += 1;
        f(&mut head.world);
    }

    /// Sets the base fee of the head block, `None` for a pre-London block.
    pub fn set_base_fee(&self, base_fee: Option<u64>) {
        self.head.lock().unwrap().base_fee = base_fee;
    }

    /// Number of the head block.
    pub fn head_number(&self) -> u64 {
        self.head.lock().unwrap().number
    }

    /// Number of `eth_simulateV1` requests served.
    pub fn simulate_calls(&self) -> usize {
        self.simulate_calls.load(Ordering::SeqCst)
    }

    /// Makes every `eth_simulateV1` request fail with a transport error.
    pub fn fail_simulate(&self, fail: bool) {
        self.fail_simulate.store(fail, Ordering::SeqCst);
    }

    /// Makes `eth_simulateV1` drop the last call result.
    pub fn truncate_results(&self, truncate: bool) {
        self.truncate_results.store(truncate, Ordering::SeqCst);
    }

    /// Makes balance reads fail in every call at or after position `index` of a batch.
    pub fn fail_reads_from(&self, index: Option<usize>) {
        *self.fail_reads_from.lock().unwrap() = index;
    }

    /// Delays every `eth_simulateV1` response.
    pub fn delay_simulate(&self, delay: Option<Duration>) {
        *self.simulate_delay.lock().unwrap() = delay;
    }

    fn block(&self, number: u64) -> Block {
        let head = self.head.lock().unwrap();
        let inner = ConsensusHeader {
            number,
            timestamp: GENESIS_TIMESTAMP + number * 12,
            gas_limit: GAS_LIMIT,
            gas_used: head.gas_used,
            base_fee_per_gas: head.base_fee,
            ..Default::default()
        };
        Block {
            header: Header { hash: inner.hash_slow(), inner, total_difficulty: None, size: None },
            uncles: Vec::new(),
            transactions: BlockTransactions::Hashes(Vec::new()),
            withdrawals: None,
        }
    }

    fn resolve(&self, block: BlockId) -> Option<u64> {
        let head = self.head_number();
        match block {
            BlockId::Number(BlockNumberOrTag::Number(number)) => (number <= head).then_some(number),
            BlockId::Number(_) => Some(head),
            BlockId::Hash(hash) => {
                (0..=head).rev().find(|number| self.block(*number).header.hash == hash.block_hash)
            }
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_chain_id(&self) -> TransportResult<ChainId> {
        Ok(self.chain_id)
    }

    async fn get_block_number(&self) -> TransportResult<u64> {
        Ok(self.head_number())
    }

    async fn get_block(&self, block: BlockId, _full: bool) -> TransportResult<Option<Block>> {
        Ok(self.resolve(block).map(|number| self.block(number)))
    }

    async fn get_balance(&self, address: Address, _block: BlockId) -> TransportResult<U256> {
        Ok(self.head.lock().unwrap().world.native(address))
    }

    async fn get_code(&self, address: Address, _block: BlockId) -> TransportResult<Bytes> {
        Ok(self.head.lock().unwrap().world.code.get(&address).cloned().unwrap_or_default())
    }

    async fn get_transaction_count(
        &self,
        address: Address,
        _block: BlockId,
    ) -> TransportResult<u64> {
        Ok(self.head.lock().unwrap().world.nonce(address))
    }

    async fn get_logs(&self, _filter: &Filter) -> TransportResult<Vec<Log>> {
        Ok(Vec::new())
    }

    async fn get_transaction_receipt(
        &self,
        _hash: TxHash,
    ) -> TransportResult<Option<TransactionReceipt>> {
        Ok(None)
    }

    async fn get_transaction_by_hash(&self, _hash: TxHash) -> TransportResult<Option<Transaction>> {
        Ok(None)
    }

    async fn simulate(
        &self,
        payload: &SimulatePayload,
        _block: BlockId,
    ) -> TransportResult<Vec<SimulatedBlock<Block>>> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.simulate_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_simulate.load(Ordering::SeqCst) {
            return Err(TransportErrorKind::custom_str("simulate unavailable"));
        }

        let fail_reads_from = *self.fail_reads_from.lock().unwrap();
        let mut world = self.head.lock().unwrap().world.clone();
        let number = self.head_number() + 1;
        let mut blocks = Vec::with_capacity(payload.block_state_calls.len());
        for sim_block in &payload.block_state_calls {
            for (address, account) in sim_block.state_overrides.iter().flatten() {
                if let Some(balance) = account.balance {
                    world.native.insert(*address, balance);
                }
                if let Some(code) = &account.code {
                    world.code.insert(*address, code.clone());
                }
            }

            let mut calls = sim_block
                .calls
                .iter()
                .enumerate()
                .map(|(index, call)| {
                    world.reads_fail = fail_reads_from.is_some_and(|from| index >= from);
                    world.execute(call)
                })
                .collect::<Vec<_>>();
            if self.truncate_results.load(Ordering::SeqCst) {
                calls.pop();
            }
            blocks.push(SimulatedBlock { inner: self.block(number), calls });
        }
        Ok(blocks)
    }
}
