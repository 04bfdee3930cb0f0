//! The worldstate capability set the interpreter executes against.
//!
//! The engine itself is storage-agnostic: it observes and mutates state only
//! through [`Host`]. Snapshots bracket every call frame, so a failing
//! subtree undoes its storage writes, logs, access-list warming, and
//! destruct marks atomically without any engine-side bookkeeping.

use bytes::Bytes;
use kestrel_common::{Account, Address, H256, Log, U256};
use rustc_hash::{FxHashMap, FxHashSet};

/// EIP-2929 temperature of an address or storage slot at access time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Cold,
    Warm,
}

impl AccessStatus {
    pub fn is_cold(self) -> bool {
        matches!(self, AccessStatus::Cold)
    }
}

/// What SSTORE needs to know about a slot in one roundtrip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SstoreResult {
    /// Value at the start of the transaction (EIP-2200 "original").
    pub original: U256,
    /// Value before this write.
    pub current: U256,
    /// Slot temperature before this write.
    pub is_cold: bool,
}

/// Effects of a SELFDESTRUCT observed by the gas schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfdestructResult {
    /// Balance moved to the beneficiary.
    pub balance: U256,
    /// Whether this account was already marked for destruction this tx.
    pub previously_destructed: bool,
}

/// Journal checkpoint token. Snapshots nest LIFO.
pub type SnapshotId = usize;

/// Abstract view of accounts, storage, and the transaction journal.
///
/// Implementations must be deterministic with respect to observed call
/// order; reads may be served from any cache as long as writes are
/// journaled under the most recent open snapshot.
pub trait Host {
    fn balance(&mut self, address: Address) -> U256;
    fn nonce(&mut self, address: Address) -> u64;
    fn code(&mut self, address: Address) -> Bytes;
    fn code_hash(&mut self, address: Address) -> H256;
    fn code_size(&mut self, address: Address) -> usize;
    fn account_exists(&mut self, address: Address) -> bool;
    /// Empty per EIP-161: zero balance, zero nonce, no code.
    fn is_empty(&mut self, address: Address) -> bool;

    fn sload(&mut self, address: Address, key: U256) -> U256;
    fn sstore(&mut self, address: Address, key: U256, new_value: U256) -> SstoreResult;
    fn tload(&mut self, address: Address, key: U256) -> U256;
    fn tstore(&mut self, address: Address, key: U256, value: U256);

    /// Mark an address warm, reporting its prior temperature. The
    /// transition is journaled.
    fn access_address(&mut self, address: Address) -> AccessStatus;
    /// Mark a storage slot warm, reporting its prior temperature.
    fn access_storage_slot(&mut self, address: Address, key: U256) -> AccessStatus;

    fn emit_log(&mut self, log: Log);

    /// Hash of block `number`, zero outside the 256-block window. The
    /// window check is the caller's concern.
    fn block_hash(&mut self, number: u64) -> H256;

    /// Move value between accounts; `false` when the sender cannot cover
    /// it, in which case nothing changed.
    fn transfer(&mut self, from: Address, to: Address, value: U256) -> bool;

    /// Bump the account nonce, returning the value before the bump, or
    /// `None` on overflow.
    fn increment_nonce(&mut self, address: Address) -> Option<u64>;

    /// Materialize a fresh contract account with the given nonce, marking
    /// it created in this transaction (EIP-6780).
    fn create_account(&mut self, address: Address, nonce: u64);

    /// Install deployed runtime code.
    fn set_code(&mut self, address: Address, code: Bytes);

    /// Whether the account was created during this transaction.
    fn created_in_transaction(&mut self, address: Address) -> bool;

    /// Transfer the whole balance to `beneficiary` and mark the account for
    /// destruction (the host applies the fork's deletion rule at the end of
    /// the transaction).
    fn selfdestruct(&mut self, address: Address, beneficiary: Address) -> SelfdestructResult;

    fn snapshot(&mut self) -> SnapshotId;
    /// Roll state back to the snapshot. Invalidates later snapshots.
    fn revert(&mut self, snapshot: SnapshotId);
    /// Keep the state accumulated since the snapshot.
    fn commit(&mut self, snapshot: SnapshotId);
}

#[derive(Debug, Clone, Default)]
struct HostState {
    accounts: FxHashMap<Address, Account>,
    storage: FxHashMap<(Address, U256), U256>,
    /// Per-transaction original values, populated on first write.
    original_storage: FxHashMap<(Address, U256), U256>,
    transient: FxHashMap<(Address, U256), U256>,
    logs: Vec<Log>,
    warm_addresses: FxHashSet<Address>,
    warm_slots: FxHashSet<(Address, U256)>,
    destructed: FxHashSet<Address>,
    created: FxHashSet<Address>,
}

/// Journaled in-memory [`Host`] used by tests and simple embeddings.
///
/// Snapshots clone the full state; fine for the state sizes this host is
/// meant for.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: HostState,
    snapshots: Vec<HostState>,
    block_hashes: FxHashMap<u64, H256>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&mut self, address: Address, account: Account) {
        self.state.accounts.insert(address, account);
    }

    pub fn set_storage(&mut self, address: Address, key: U256, value: U256) {
        self.state.storage.insert((address, key), value);
    }

    pub fn storage_value(&self, address: Address, key: U256) -> U256 {
        self.state
            .storage
            .get(&(address, key))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_block_hash(&mut self, number: u64, hash: H256) {
        self.block_hashes.insert(number, hash);
    }

    pub fn logs(&self) -> &[Log] {
        &self.state.logs
    }

    pub fn account(&self, address: Address) -> Option<&Account> {
        self.state.accounts.get(&address)
    }

    pub fn is_destructed(&self, address: Address) -> bool {
        self.state.destructed.contains(&address)
    }

    /// Seed the EIP-2929 warm set for a transaction: origin, target, and
    /// the fork's precompiles.
    pub fn prewarm(&mut self, addresses: impl IntoIterator<Item = Address>) {
        self.state.warm_addresses.extend(addresses);
    }
}

impl Host for InMemoryHost {
    fn balance(&mut self, address: Address) -> U256 {
        self.state
            .accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    fn nonce(&mut self, address: Address) -> u64 {
        self.state
            .accounts
            .get(&address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    fn code(&mut self, address: Address) -> Bytes {
        self.state
            .accounts
            .get(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    fn code_hash(&mut self, address: Address) -> H256 {
        self.state
            .accounts
            .get(&address)
            .map(|account| account.code_hash())
            .unwrap_or_default()
    }

    fn code_size(&mut self, address: Address) -> usize {
        self.state
            .accounts
            .get(&address)
            .map(|account| account.code.len())
            .unwrap_or_default()
    }

    fn account_exists(&mut self, address: Address) -> bool {
        self.state.accounts.contains_key(&address)
    }

    fn is_empty(&mut self, address: Address) -> bool {
        self.state
            .accounts
            .get(&address)
            .map(Account::is_empty)
            .unwrap_or(true)
    }

    fn sload(&mut self, address: Address, key: U256) -> U256 {
        self.state
            .storage
            .get(&(address, key))
            .copied()
            .unwrap_or_default()
    }

    fn sstore(&mut self, address: Address, key: U256, new_value: U256) -> SstoreResult {
        let current = self
            .state
            .storage
            .get(&(address, key))
            .copied()
            .unwrap_or_default();
        let original = *self
            .state
            .original_storage
            .entry((address, key))
            .or_insert(current);
        let is_cold = self.access_storage_slot(address, key).is_cold();
        self.state.storage.insert((address, key), new_value);
        SstoreResult {
            original,
            current,
            is_cold,
        }
    }

    fn tload(&mut self, address: Address, key: U256) -> U256 {
        self.state
            .transient
            .get(&(address, key))
            .copied()
            .unwrap_or_default()
    }

    fn tstore(&mut self, address: Address, key: U256, value: U256) {
        self.state.transient.insert((address, key), value);
    }

    fn access_address(&mut self, address: Address) -> AccessStatus {
        if self.state.warm_addresses.insert(address) {
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }

    fn access_storage_slot(&mut self, address: Address, key: U256) -> AccessStatus {
        if self.state.warm_slots.insert((address, key)) {
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }

    fn emit_log(&mut self, log: Log) {
        self.state.logs.push(log);
    }

    fn block_hash(&mut self, number: u64) -> H256 {
        self.block_hashes.get(&number).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> bool {
        if value.is_zero() {
            return true;
        }
        let Some(sender) = self.state.accounts.get_mut(&from) else {
            return false;
        };
        let Some(debited) = sender.balance.checked_sub(value) else {
            return false;
        };
        sender.balance = debited;
        let recipient = self.state.accounts.entry(to).or_default();
        recipient.balance = recipient.balance.saturating_add(value);
        true
    }

    fn increment_nonce(&mut self, address: Address) -> Option<u64> {
        let account = self.state.accounts.entry(address).or_default();
        let previous = account.nonce;
        account.nonce = account.nonce.checked_add(1)?;
        Some(previous)
    }

    fn create_account(&mut self, address: Address, nonce: u64) {
        let account = self.state.accounts.entry(address).or_default();
        account.nonce = nonce;
        account.code = Bytes::new();
        self.state.created.insert(address);
    }

    fn set_code(&mut self, address: Address, code: Bytes) {
        let account = self.state.accounts.entry(address).or_default();
        account.code = code;
    }

    fn created_in_transaction(&mut self, address: Address) -> bool {
        self.state.created.contains(&address)
    }

    fn selfdestruct(&mut self, address: Address, beneficiary: Address) -> SelfdestructResult {
        let balance = self.balance(address);
        if address != beneficiary {
            self.transfer(address, beneficiary, balance);
        }
        let previously_destructed = !self.state.destructed.insert(address);
        SelfdestructResult {
            balance,
            previously_destructed,
        }
    }

    fn snapshot(&mut self) -> SnapshotId {
        self.snapshots.push(self.state.clone());
        self.snapshots.len().saturating_sub(1)
    }

    fn revert(&mut self, snapshot: SnapshotId) {
        if let Some(saved) = self.snapshots.get(snapshot) {
            self.state = saved.clone();
        }
        self.snapshots.truncate(snapshot);
    }

    fn commit(&mut self, snapshot: SnapshotId) {
        self.snapshots.truncate(snapshot);
    }
}
