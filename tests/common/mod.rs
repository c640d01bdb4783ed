//! Common test utilities: an in-memory fake chain and database fixtures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;

use ticketchain::chain::ChainGateway;
use ticketchain::domain::{
    CancelledLog, ChainListing, ChainTicketData, ListedLog, MarketLogPage, SoldLog, TokenTransfer,
    TxConfirmation,
};
use ticketchain::infra::{MarketError, Result};
use ticketchain::KeyCustody;

/// Connect to the test database, or None when DATABASE_URL is unset.
pub async fn connect_db() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .ok()?;
    Some(pool)
}

/// Custody instance with a fixed test master key.
pub fn test_custody() -> KeyCustody {
    KeyCustody::new([42u8; 32])
}

/// Unique username so runs against a shared database never collide.
pub fn unique_username(prefix: &str) -> String {
    format!("{prefix}-{:016x}", rand::random::<u64>())
}

#[derive(Default)]
struct ChainState {
    head_block: i64,
    next_token_id: i64,
    tx_counter: u64,
    fee_bps: i64,
    service_wallet: Address,
    balances: HashMap<Address, U256>,
    owners: HashMap<i64, Address>,
    ticket_data: HashMap<i64, ChainTicketData>,
    listings: HashMap<i64, ChainListing>,
    approvals: HashMap<i64, Address>,
    logs: MarketLogPage,
    revert_next: bool,
}

/// In-memory chain double implementing the gateway trait.
///
/// Sends mutate the fake contract state, advance the head block, and
/// record logs so the indexer can replay them. `revert_next` simulates a
/// mined-but-reverted transaction: gas is "spent" (the tx counter and head
/// advance) but no state changes.
pub struct FakeChain {
    ticket_contract: Address,
    marketplace_contract: Address,
    minter: Address,
    sends: AtomicUsize,
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Self {
        let mut state = ChainState {
            head_block: 100,
            next_token_id: 1,
            fee_bps: 250,
            service_wallet: Address::repeat_byte(0xfe),
            ..Default::default()
        };
        state.balances.insert(Address::ZERO, U256::ZERO);
        Self {
            ticket_contract: Address::from(rand::random::<[u8; 20]>()),
            marketplace_contract: Address::from(rand::random::<[u8; 20]>()),
            minter: Address::repeat_byte(0xee),
            sends: AtomicUsize::new(0),
            state: Mutex::new(state),
        }
    }

    pub fn with_fee(self, fee_bps: i64) -> Self {
        self.state.lock().unwrap().fee_bps = fee_bps;
        self
    }

    /// Number of state-changing transactions submitted so far.
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn fund(&self, address: Address, amount: u64) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(address, U256::from(amount));
    }

    /// Make the next send mine a reverted receipt.
    pub fn revert_next_send(&self) {
        self.state.lock().unwrap().revert_next = true;
    }

    pub fn owner_of_token(&self, token_id: i64) -> Option<Address> {
        self.state.lock().unwrap().owners.get(&token_id).copied()
    }

    pub fn listing_of(&self, token_id: i64) -> Option<ChainListing> {
        self.state.lock().unwrap().listings.get(&token_id).copied()
    }

    /// Seed a token as if it had been minted long ago, without a receipt.
    pub fn seed_token(&self, token_id: i64, owner: Address, event_id: i64, original_price: i64) {
        let mut state = self.state.lock().unwrap();
        state.owners.insert(token_id, owner);
        state.ticket_data.insert(
            token_id,
            ChainTicketData {
                event_id,
                original_price,
            },
        );
        state.next_token_id = state.next_token_id.max(token_id + 1);
    }

    /// Seed an externally created listing plus its log, for indexer tests.
    pub fn seed_external_listing(&self, token_id: i64, seller: Address, price: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.head_block += 1;
        let block = state.head_block;
        state.listings.insert(
            token_id,
            ChainListing {
                seller,
                price,
                active: true,
            },
        );
        state.logs.listed.push(ListedLog {
            token_id,
            seller,
            price,
            block_number: block,
        });
        block
    }

    /// Seed an external sale of an active listing, for indexer tests.
    pub fn seed_external_sale(&self, token_id: i64, buyer: Address) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.head_block += 1;
        let block = state.head_block;
        let listing = state.listings.get_mut(&token_id).expect("listing seeded");
        listing.active = false;
        let seller = listing.seller;
        let price = listing.price;
        state.owners.insert(token_id, buyer);
        state.logs.sold.push(SoldLog {
            token_id,
            seller,
            buyer,
            price,
            block_number: block,
        });
        block
    }

    fn fake_time(block_number: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + block_number, 0).unwrap()
    }

    /// Mine one transaction: bump counters and either revert or apply.
    fn mine<F>(&self, apply: F) -> Result<TxConfirmation>
    where
        F: FnOnce(&mut ChainState) -> Result<Vec<TokenTransfer>>,
    {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.head_block += 1;
        state.tx_counter += 1;
        let tx_hash = format!("0x{:064x}", state.tx_counter);
        let block_number = state.head_block;

        if state.revert_next {
            state.revert_next = false;
            return Err(MarketError::TransactionReverted { tx_hash });
        }

        let transfers = apply(&mut state)?;
        Ok(TxConfirmation {
            tx_hash,
            block_number,
            block_time: Self::fake_time(block_number),
            transfers,
        })
    }
}

#[async_trait]
impl ChainGateway for FakeChain {
    fn ticket_contract(&self) -> Address {
        self.ticket_contract
    }

    fn marketplace_contract(&self) -> Address {
        self.marketplace_contract
    }

    fn minter_address(&self) -> Address {
        self.minter
    }

    async fn head_block(&self) -> Result<i64> {
        Ok(self.state.lock().unwrap().head_block)
    }

    async fn block_time(&self, block_number: i64) -> Result<DateTime<Utc>> {
        Ok(Self::fake_time(block_number))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn owner_of(&self, token_id: i64) -> Result<Address> {
        self.state
            .lock()
            .unwrap()
            .owners
            .get(&token_id)
            .copied()
            .ok_or_else(|| MarketError::Provider(format!("ownerOf({token_id}): unknown token")))
    }

    async fn ticket_data(&self, token_id: i64) -> Result<ChainTicketData> {
        self.state
            .lock()
            .unwrap()
            .ticket_data
            .get(&token_id)
            .copied()
            .ok_or_else(|| MarketError::Provider(format!("ticketData({token_id}): unknown token")))
    }

    async fn listing(&self, token_id: i64) -> Result<ChainListing> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .listings
            .get(&token_id)
            .copied()
            .unwrap_or(ChainListing {
                seller: Address::ZERO,
                price: 0,
                active: false,
            }))
    }

    async fn fee_basis_points(&self) -> Result<i64> {
        Ok(self.state.lock().unwrap().fee_bps)
    }

    async fn service_wallet(&self) -> Result<Address> {
        Ok(self.state.lock().unwrap().service_wallet)
    }

    async fn register_event(
        &self,
        _event_id: i64,
        _creator: Address,
        _original_price: i64,
    ) -> Result<TxConfirmation> {
        self.mine(|_| Ok(Vec::new()))
    }

    async fn mint_ticket(
        &self,
        recipient: Address,
        event_id: i64,
        original_price: i64,
    ) -> Result<TxConfirmation> {
        self.mine(|state| {
            let token_id = state.next_token_id;
            state.next_token_id += 1;
            state.owners.insert(token_id, recipient);
            state.ticket_data.insert(
                token_id,
                ChainTicketData {
                    event_id,
                    original_price,
                },
            );
            Ok(vec![TokenTransfer {
                from: Address::ZERO,
                to: recipient,
                token_id,
            }])
        })
    }

    async fn buy_and_mint_ticket(
        &self,
        signer: PrivateKeySigner,
        event_id: i64,
        total_due: U256,
    ) -> Result<TxConfirmation> {
        let buyer = signer.address();
        self.mine(|state| {
            let balance = state.balances.get(&buyer).copied().unwrap_or(U256::ZERO);
            if balance < total_due {
                return Err(MarketError::Provider("insufficient funds for value".into()));
            }
            state.balances.insert(buyer, balance - total_due);

            let token_id = state.next_token_id;
            state.next_token_id += 1;
            state.owners.insert(token_id, buyer);
            let paid = u64::try_from(total_due).map(|v| v as i64).unwrap_or(i64::MAX);
            state.ticket_data.insert(
                token_id,
                ChainTicketData {
                    event_id,
                    original_price: paid,
                },
            );
            Ok(vec![TokenTransfer {
                from: Address::ZERO,
                to: buyer,
                token_id,
            }])
        })
    }

    async fn approve_marketplace(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
    ) -> Result<TxConfirmation> {
        let caller = signer.address();
        let marketplace = self.marketplace_contract;
        self.mine(|state| {
            if state.owners.get(&token_id) != Some(&caller) {
                return Err(MarketError::Provider("approve: not the owner".into()));
            }
            state.approvals.insert(token_id, marketplace);
            Ok(Vec::new())
        })
    }

    async fn list_item(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
        price: i64,
    ) -> Result<TxConfirmation> {
        let seller = signer.address();
        let marketplace = self.marketplace_contract;
        self.mine(|state| {
            if state.owners.get(&token_id) != Some(&seller) {
                return Err(MarketError::Provider("listItem: not the owner".into()));
            }
            if state.approvals.get(&token_id) != Some(&marketplace) {
                return Err(MarketError::Provider("listItem: not approved".into()));
            }
            let block = state.head_block;
            state.listings.insert(
                token_id,
                ChainListing {
                    seller,
                    price,
                    active: true,
                },
            );
            state.logs.listed.push(ListedLog {
                token_id,
                seller,
                price,
                block_number: block,
            });
            Ok(Vec::new())
        })
    }

    async fn buy_item(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
        total_due: U256,
    ) -> Result<TxConfirmation> {
        let buyer = signer.address();
        self.mine(|state| {
            let listing = match state.listings.get(&token_id) {
                Some(l) if l.active => *l,
                _ => return Err(MarketError::Provider("buyItem: not listed".into())),
            };
            if listing.seller == buyer {
                return Err(MarketError::Provider("buyItem: self trade".into()));
            }
            let balance = state.balances.get(&buyer).copied().unwrap_or(U256::ZERO);
            if balance < total_due {
                return Err(MarketError::Provider("insufficient funds for value".into()));
            }
            state.balances.insert(buyer, balance - total_due);

            let seller = listing.seller;
            let price = listing.price;
            let block = state.head_block;
            state.owners.insert(token_id, buyer);
            if let Some(l) = state.listings.get_mut(&token_id) {
                l.active = false;
            }
            state.logs.sold.push(SoldLog {
                token_id,
                seller,
                buyer,
                price,
                block_number: block,
            });
            Ok(vec![TokenTransfer {
                from: seller,
                to: buyer,
                token_id,
            }])
        })
    }

    async fn cancel_listing(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
    ) -> Result<TxConfirmation> {
        let caller = signer.address();
        self.mine(|state| {
            let listing = match state.listings.get(&token_id) {
                Some(l) if l.active => *l,
                _ => return Err(MarketError::Provider("cancelListing: not listed".into())),
            };
            if listing.seller != caller {
                return Err(MarketError::Provider("cancelListing: not the seller".into()));
            }
            let block = state.head_block;
            if let Some(l) = state.listings.get_mut(&token_id) {
                l.active = false;
            }
            state.logs.cancelled.push(CancelledLog {
                token_id,
                seller: caller,
                block_number: block,
            });
            Ok(Vec::new())
        })
    }

    async fn transfer_token(
        &self,
        signer: PrivateKeySigner,
        to: Address,
        token_id: i64,
    ) -> Result<TxConfirmation> {
        let from = signer.address();
        self.mine(|state| {
            if state.owners.get(&token_id) != Some(&from) {
                return Err(MarketError::Provider("transfer: not the owner".into()));
            }
            state.owners.insert(token_id, to);
            Ok(vec![TokenTransfer { from, to, token_id }])
        })
    }

    async fn marketplace_logs(&self, from_block: i64, to_block: i64) -> Result<MarketLogPage> {
        let state = self.state.lock().unwrap();
        let in_range = |b: i64| b >= from_block && b <= to_block;
        Ok(MarketLogPage {
            listed: state
                .logs
                .listed
                .iter()
                .copied()
                .filter(|l| in_range(l.block_number))
                .collect(),
            sold: state
                .logs
                .sold
                .iter()
                .copied()
                .filter(|l| in_range(l.block_number))
                .collect(),
            cancelled: state
                .logs
                .cancelled
                .iter()
                .copied()
                .filter(|l| in_range(l.block_number))
                .collect(),
        })
    }
}
