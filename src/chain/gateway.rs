//! RPC implementation of the chain gateway.
//!
//! Holds one shared read provider and the minter signer loaded once at
//! startup; write providers are assembled per send around the caller's
//! signer. Every send is awaited with a bounded timeout so a dropped or
//! stuck transaction surfaces as `ConfirmationTimeout` instead of hanging
//! the request.

use std::time::Duration;

use alloy::consensus::TxReceipt as _;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{
    PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder, RootProvider,
    WatchTxError,
};
use alloy::rpc::types::{BlockNumberOrTag, BlockTransactionsKind, Filter, Log, TransactionReceipt};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy::transports::http::reqwest::Url;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::chain::ChainGateway;
use crate::domain::{
    CancelledLog, ChainListing, ChainTicketData, ListedLog, MarketLogPage, SoldLog, TokenTransfer,
    TxConfirmation,
};
use crate::infra::{MarketError, Result};

// Contract bindings
sol! {
    #[sol(rpc)]
    interface ITicketNFT {
        function ownerOf(uint256 tokenId) external view returns (address);
        function approve(address to, uint256 tokenId) external;
        function ticketData(uint256 tokenId) external view returns (uint256 eventId, uint256 originalPrice);
        function registerEvent(uint256 eventId, address creator, uint256 originalPrice) external;
        function mintTicket(address to, uint256 eventId, uint256 originalPrice) external;
        function buyAndMintTicket(uint256 eventId) external payable;
        function safeTransferFrom(address from, address to, uint256 tokenId) external;

        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }

    #[sol(rpc)]
    interface IMarketplace {
        function listings(uint256 tokenId) external view returns (address seller, uint256 price, bool active);
        function listItem(uint256 tokenId, uint256 price) external;
        function buyItem(uint256 tokenId) external payable;
        function cancelListing(uint256 tokenId) external;
        function serviceFeeBasisPoints() external view returns (uint256);
        function serviceWallet() external view returns (address);

        event ItemListed(uint256 indexed tokenId, address indexed seller, uint256 price);
        event ItemSold(uint256 indexed tokenId, address seller, address buyer, uint256 price);
        event ListingCancelled(uint256 indexed tokenId, address indexed seller);
    }
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// RPC URL for the chain node
    pub rpc_url: String,
    /// Ticket collection contract address
    pub ticket_contract: Address,
    /// Marketplace contract address
    pub marketplace_contract: Address,
    /// Private key for the privileged minter identity
    pub minter_private_key: String,
    /// Confirmations to wait for on each send
    pub confirmations: u64,
    /// Upper bound on the receipt wait
    pub confirmation_timeout: Duration,
}

impl ChainConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let rpc_url = std::env::var("RPC_URL")
            .map_err(|_| MarketError::Configuration("RPC_URL is not set".to_string()))?;

        let ticket_contract = std::env::var("TICKET_CONTRACT_ADDRESS")
            .map_err(|_| {
                MarketError::Configuration("TICKET_CONTRACT_ADDRESS is not set".to_string())
            })?
            .parse()
            .map_err(|_| {
                MarketError::Configuration("TICKET_CONTRACT_ADDRESS is not an address".to_string())
            })?;

        let marketplace_contract = std::env::var("MARKETPLACE_CONTRACT_ADDRESS")
            .map_err(|_| {
                MarketError::Configuration("MARKETPLACE_CONTRACT_ADDRESS is not set".to_string())
            })?
            .parse()
            .map_err(|_| {
                MarketError::Configuration(
                    "MARKETPLACE_CONTRACT_ADDRESS is not an address".to_string(),
                )
            })?;

        let minter_private_key = std::env::var("MINTER_PRIVATE_KEY").map_err(|_| {
            MarketError::Configuration("MINTER_PRIVATE_KEY is not set".to_string())
        })?;

        let confirmations = std::env::var("CONFIRMATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let confirmation_timeout = std::env::var("CONFIRMATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(120));

        Ok(Self {
            rpc_url,
            ticket_contract,
            marketplace_contract,
            minter_private_key,
            confirmations,
            confirmation_timeout,
        })
    }
}

/// Chain gateway backed by a JSON-RPC provider
pub struct RpcChainGateway {
    config: ChainConfig,
    rpc_url: Url,
    read_provider: RootProvider<Http<Client>>,
    minter: PrivateKeySigner,
}

impl RpcChainGateway {
    /// Create the gateway, parsing the minter key once at startup.
    pub fn new(config: ChainConfig) -> Result<Self> {
        let rpc_url: Url = config
            .rpc_url
            .parse()
            .map_err(|e| MarketError::Configuration(format!("invalid RPC URL: {e}")))?;

        let minter: PrivateKeySigner = config
            .minter_private_key
            .parse()
            .map_err(|_| MarketError::Configuration("invalid minter private key".to_string()))?;

        let read_provider = RootProvider::new_http(rpc_url.clone());

        info!(
            ticket_contract = %config.ticket_contract,
            marketplace_contract = %config.marketplace_contract,
            minter = %minter.address(),
            "chain gateway initialized"
        );

        Ok(Self {
            config,
            rpc_url,
            read_provider,
            minter,
        })
    }

    fn u256_to_i64(value: U256, what: &str) -> Result<i64> {
        let v = u64::try_from(value)
            .map_err(|_| MarketError::Internal(format!("{what} out of range: {value}")))?;
        i64::try_from(v).map_err(|_| MarketError::Internal(format!("{what} out of range: {value}")))
    }

    /// Wait for the receipt of a sent transaction, classifying failures.
    async fn confirm(
        &self,
        pending: PendingTransactionBuilder<Http<Client>, alloy::network::Ethereum>,
    ) -> Result<TxConfirmation> {
        let tx_hash = format!("{:#x}", *pending.tx_hash());
        debug!(%tx_hash, "transaction sent, awaiting confirmation");

        let receipt = pending
            .with_required_confirmations(self.config.confirmations)
            .with_timeout(Some(self.config.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|e| match e {
                PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                    MarketError::ConfirmationTimeout {
                        tx_hash: tx_hash.clone(),
                    }
                }
                other => MarketError::Provider(format!(
                    "waiting for receipt of {tx_hash}: {other}"
                )),
            })?;

        self.confirmation_from_receipt(tx_hash, receipt).await
    }

    /// Turn a mined receipt into a domain confirmation; a revert is a
    /// transaction-level failure distinct from a network error.
    async fn confirmation_from_receipt(
        &self,
        tx_hash: String,
        receipt: TransactionReceipt,
    ) -> Result<TxConfirmation> {
        if !receipt.status() {
            return Err(MarketError::TransactionReverted { tx_hash });
        }

        let block_number = receipt.block_number.ok_or_else(|| {
            MarketError::Provider(format!("receipt of {tx_hash} carries no block number"))
        })? as i64;
        let block_time = self.block_time_inner(block_number).await?;

        let mut transfers = Vec::new();
        for log in receipt.inner.logs() {
            if log.address() != self.config.ticket_contract {
                continue;
            }
            if let Ok(decoded) = log.log_decode::<ITicketNFT::Transfer>() {
                let data = decoded.inner.data;
                transfers.push(TokenTransfer {
                    from: data.from,
                    to: data.to,
                    token_id: Self::u256_to_i64(data.tokenId, "token id")?,
                });
            }
        }

        info!(%tx_hash, block_number, transfers = transfers.len(), "transaction confirmed");

        Ok(TxConfirmation {
            tx_hash,
            block_number,
            block_time,
            transfers,
        })
    }

    async fn block_time_inner(&self, block_number: i64) -> Result<DateTime<Utc>> {
        let block = self
            .read_provider
            .get_block_by_number(
                BlockNumberOrTag::Number(block_number as u64),
                BlockTransactionsKind::Hashes,
            )
            .await
            .map_err(|e| MarketError::Provider(format!("fetching block {block_number}: {e}")))?
            .ok_or_else(|| {
                MarketError::Provider(format!("block {block_number} not found on the node"))
            })?;

        DateTime::from_timestamp(block.header.timestamp as i64, 0).ok_or_else(|| {
            MarketError::Internal(format!("block {block_number} timestamp out of range"))
        })
    }

    /// Write provider bound to a signer; assembled per send because each
    /// request may sign with a different custodied key.
    fn write_provider(&self, signer: PrivateKeySigner) -> impl Provider<Http<Client>> {
        ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_http(self.rpc_url.clone())
    }

    async fn fetch_logs(&self, signature: alloy::primitives::B256, from: i64, to: i64) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(self.config.marketplace_contract)
            .event_signature(signature)
            .from_block(from as u64)
            .to_block(to as u64);

        self.read_provider
            .get_logs(&filter)
            .await
            .map_err(|e| MarketError::Provider(format!("log query [{from}, {to}] failed: {e}")))
    }

    fn log_block_number(log: &Log) -> Result<i64> {
        log.block_number
            .map(|b| b as i64)
            .ok_or_else(|| MarketError::Provider("log carries no block number".to_string()))
    }
}

#[async_trait]
impl ChainGateway for RpcChainGateway {
    fn ticket_contract(&self) -> Address {
        self.config.ticket_contract
    }

    fn marketplace_contract(&self) -> Address {
        self.config.marketplace_contract
    }

    fn minter_address(&self) -> Address {
        self.minter.address()
    }

    async fn head_block(&self) -> Result<i64> {
        let head = self
            .read_provider
            .get_block_number()
            .await
            .map_err(|e| MarketError::Provider(format!("fetching head block: {e}")))?;
        Ok(head as i64)
    }

    async fn block_time(&self, block_number: i64) -> Result<DateTime<Utc>> {
        self.block_time_inner(block_number).await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.read_provider
            .get_balance(address)
            .await
            .map_err(|e| MarketError::Provider(format!("fetching balance of {address}: {e}")))
    }

    async fn owner_of(&self, token_id: i64) -> Result<Address> {
        let contract = ITicketNFT::new(self.config.ticket_contract, &self.read_provider);
        let owner = contract
            .ownerOf(U256::from(token_id as u64))
            .call()
            .await
            .map_err(|e| MarketError::Provider(format!("ownerOf({token_id}) failed: {e}")))?;
        Ok(owner._0)
    }

    async fn ticket_data(&self, token_id: i64) -> Result<ChainTicketData> {
        let contract = ITicketNFT::new(self.config.ticket_contract, &self.read_provider);
        let data = contract
            .ticketData(U256::from(token_id as u64))
            .call()
            .await
            .map_err(|e| MarketError::Provider(format!("ticketData({token_id}) failed: {e}")))?;

        Ok(ChainTicketData {
            event_id: Self::u256_to_i64(data.eventId, "event id")?,
            original_price: Self::u256_to_i64(data.originalPrice, "original price")?,
        })
    }

    async fn listing(&self, token_id: i64) -> Result<ChainListing> {
        let contract = IMarketplace::new(self.config.marketplace_contract, &self.read_provider);
        let listing = contract
            .listings(U256::from(token_id as u64))
            .call()
            .await
            .map_err(|e| MarketError::Provider(format!("listings({token_id}) failed: {e}")))?;

        Ok(ChainListing {
            seller: listing.seller,
            price: Self::u256_to_i64(listing.price, "listing price")?,
            active: listing.active,
        })
    }

    async fn fee_basis_points(&self) -> Result<i64> {
        let contract = IMarketplace::new(self.config.marketplace_contract, &self.read_provider);
        let bps = contract
            .serviceFeeBasisPoints()
            .call()
            .await
            .map_err(|e| MarketError::Provider(format!("serviceFeeBasisPoints failed: {e}")))?;
        Self::u256_to_i64(bps._0, "fee basis points")
    }

    async fn service_wallet(&self) -> Result<Address> {
        let contract = IMarketplace::new(self.config.marketplace_contract, &self.read_provider);
        let wallet = contract
            .serviceWallet()
            .call()
            .await
            .map_err(|e| MarketError::Provider(format!("serviceWallet failed: {e}")))?;
        Ok(wallet._0)
    }

    #[instrument(skip(self))]
    async fn register_event(
        &self,
        event_id: i64,
        creator: Address,
        original_price: i64,
    ) -> Result<TxConfirmation> {
        let provider = self.write_provider(self.minter.clone());
        let contract = ITicketNFT::new(self.config.ticket_contract, &provider);

        let pending = contract
            .registerEvent(
                U256::from(event_id as u64),
                creator,
                U256::from(original_price as u64),
            )
            .send()
            .await
            .map_err(|e| MarketError::Provider(format!("registerEvent send failed: {e}")))?;

        self.confirm(pending).await
    }

    #[instrument(skip(self))]
    async fn mint_ticket(
        &self,
        recipient: Address,
        event_id: i64,
        original_price: i64,
    ) -> Result<TxConfirmation> {
        let provider = self.write_provider(self.minter.clone());
        let contract = ITicketNFT::new(self.config.ticket_contract, &provider);

        let pending = contract
            .mintTicket(
                recipient,
                U256::from(event_id as u64),
                U256::from(original_price as u64),
            )
            .send()
            .await
            .map_err(|e| MarketError::Provider(format!("mintTicket send failed: {e}")))?;

        self.confirm(pending).await
    }

    #[instrument(skip(self, signer))]
    async fn buy_and_mint_ticket(
        &self,
        signer: PrivateKeySigner,
        event_id: i64,
        total_due: U256,
    ) -> Result<TxConfirmation> {
        let provider = self.write_provider(signer);
        let contract = ITicketNFT::new(self.config.ticket_contract, &provider);

        let pending = contract
            .buyAndMintTicket(U256::from(event_id as u64))
            .value(total_due)
            .send()
            .await
            .map_err(|e| MarketError::Provider(format!("buyAndMintTicket send failed: {e}")))?;

        self.confirm(pending).await
    }

    #[instrument(skip(self, signer))]
    async fn approve_marketplace(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
    ) -> Result<TxConfirmation> {
        let provider = self.write_provider(signer);
        let contract = ITicketNFT::new(self.config.ticket_contract, &provider);

        let pending = contract
            .approve(self.config.marketplace_contract, U256::from(token_id as u64))
            .send()
            .await
            .map_err(|e| MarketError::Provider(format!("approve send failed: {e}")))?;

        self.confirm(pending).await
    }

    #[instrument(skip(self, signer))]
    async fn list_item(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
        price: i64,
    ) -> Result<TxConfirmation> {
        let provider = self.write_provider(signer);
        let contract = IMarketplace::new(self.config.marketplace_contract, &provider);

        let pending = contract
            .listItem(U256::from(token_id as u64), U256::from(price as u64))
            .send()
            .await
            .map_err(|e| MarketError::Provider(format!("listItem send failed: {e}")))?;

        self.confirm(pending).await
    }

    #[instrument(skip(self, signer))]
    async fn buy_item(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
        total_due: U256,
    ) -> Result<TxConfirmation> {
        let provider = self.write_provider(signer);
        let contract = IMarketplace::new(self.config.marketplace_contract, &provider);

        let pending = contract
            .buyItem(U256::from(token_id as u64))
            .value(total_due)
            .send()
            .await
            .map_err(|e| MarketError::Provider(format!("buyItem send failed: {e}")))?;

        self.confirm(pending).await
    }

    #[instrument(skip(self, signer))]
    async fn cancel_listing(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
    ) -> Result<TxConfirmation> {
        let provider = self.write_provider(signer);
        let contract = IMarketplace::new(self.config.marketplace_contract, &provider);

        let pending = contract
            .cancelListing(U256::from(token_id as u64))
            .send()
            .await
            .map_err(|e| MarketError::Provider(format!("cancelListing send failed: {e}")))?;

        self.confirm(pending).await
    }

    #[instrument(skip(self, signer))]
    async fn transfer_token(
        &self,
        signer: PrivateKeySigner,
        to: Address,
        token_id: i64,
    ) -> Result<TxConfirmation> {
        let from = signer.address();
        let provider = self.write_provider(signer);
        let contract = ITicketNFT::new(self.config.ticket_contract, &provider);

        let pending = contract
            .safeTransferFrom(from, to, U256::from(token_id as u64))
            .send()
            .await
            .map_err(|e| MarketError::Provider(format!("safeTransferFrom send failed: {e}")))?;

        self.confirm(pending).await
    }

    #[instrument(skip(self))]
    async fn marketplace_logs(&self, from_block: i64, to_block: i64) -> Result<MarketLogPage> {
        let (listed_raw, sold_raw, cancelled_raw) = tokio::try_join!(
            self.fetch_logs(IMarketplace::ItemListed::SIGNATURE_HASH, from_block, to_block),
            self.fetch_logs(IMarketplace::ItemSold::SIGNATURE_HASH, from_block, to_block),
            self.fetch_logs(
                IMarketplace::ListingCancelled::SIGNATURE_HASH,
                from_block,
                to_block
            ),
        )?;

        let mut page = MarketLogPage::default();

        for log in &listed_raw {
            let decoded = log
                .log_decode::<IMarketplace::ItemListed>()
                .map_err(|e| MarketError::Provider(format!("decoding ItemListed log: {e}")))?;
            let data = decoded.inner.data;
            page.listed.push(ListedLog {
                token_id: Self::u256_to_i64(data.tokenId, "token id")?,
                seller: data.seller,
                price: Self::u256_to_i64(data.price, "listing price")?,
                block_number: Self::log_block_number(log)?,
            });
        }

        for log in &sold_raw {
            let decoded = log
                .log_decode::<IMarketplace::ItemSold>()
                .map_err(|e| MarketError::Provider(format!("decoding ItemSold log: {e}")))?;
            let data = decoded.inner.data;
            page.sold.push(SoldLog {
                token_id: Self::u256_to_i64(data.tokenId, "token id")?,
                seller: data.seller,
                buyer: data.buyer,
                price: Self::u256_to_i64(data.price, "sale price")?,
                block_number: Self::log_block_number(log)?,
            });
        }

        for log in &cancelled_raw {
            let decoded = log
                .log_decode::<IMarketplace::ListingCancelled>()
                .map_err(|e| {
                    MarketError::Provider(format!("decoding ListingCancelled log: {e}"))
                })?;
            let data = decoded.inner.data;
            page.cancelled.push(CancelledLog {
                token_id: Self::u256_to_i64(data.tokenId, "token id")?,
                seller: data.seller,
                block_number: Self::log_block_number(log)?,
            });
        }

        debug!(
            from_block,
            to_block,
            listed = page.listed.len(),
            sold = page.sold.len(),
            cancelled = page.cancelled.len(),
            "fetched marketplace logs"
        );

        Ok(page)
    }
}
