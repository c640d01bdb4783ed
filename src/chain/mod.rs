//! Chain gateway: the single seam between services and the network.
//!
//! Services depend on the [`ChainGateway`] trait and receive only
//! domain-typed facts (confirmations, decoded logs, listing snapshots), so
//! tests can substitute a fake chain and no provider types leak upward.

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::domain::{ChainListing, ChainTicketData, MarketLogPage, TxConfirmation};
use crate::infra::Result;

mod gateway;

pub use gateway::{ChainConfig, RpcChainGateway};

/// Call/send primitives against the ticket and marketplace contracts.
///
/// Sends await confirmation with a bounded timeout and return a
/// [`TxConfirmation`] only for receipts with success status; a mined
/// revert surfaces as `TransactionReverted`, distinct from transport
/// errors, and a confirmation that never arrives as `ConfirmationTimeout`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Ticket collection contract address.
    fn ticket_contract(&self) -> Address;

    /// Marketplace contract address.
    fn marketplace_contract(&self) -> Address;

    /// Address of the privileged minter identity.
    fn minter_address(&self) -> Address;

    /// Current chain head block number.
    async fn head_block(&self) -> Result<i64>;

    /// Timestamp of a mined block.
    async fn block_time(&self, block_number: i64) -> Result<DateTime<Utc>>;

    /// Native balance of an address.
    async fn balance(&self, address: Address) -> Result<U256>;

    /// `ownerOf(tokenId)` on the ticket contract.
    async fn owner_of(&self, token_id: i64) -> Result<Address>;

    /// `ticketData(tokenId)` on the ticket contract.
    async fn ticket_data(&self, token_id: i64) -> Result<ChainTicketData>;

    /// `listings(tokenId)` on the marketplace contract.
    async fn listing(&self, token_id: i64) -> Result<ChainListing>;

    /// Live `serviceFeeBasisPoints()` from the marketplace contract.
    async fn fee_basis_points(&self) -> Result<i64>;

    /// `serviceWallet()` fee recipient from the marketplace contract.
    async fn service_wallet(&self) -> Result<Address>;

    /// Minter-signed `registerEvent(eventId, creator, originalPrice)`.
    async fn register_event(
        &self,
        event_id: i64,
        creator: Address,
        original_price: i64,
    ) -> Result<TxConfirmation>;

    /// Minter-signed `mintTicket(to, eventId, originalPrice)`.
    async fn mint_ticket(
        &self,
        recipient: Address,
        event_id: i64,
        original_price: i64,
    ) -> Result<TxConfirmation>;

    /// Buyer-signed payable `buyAndMintTicket(eventId)` with `value = total_due`.
    async fn buy_and_mint_ticket(
        &self,
        signer: PrivateKeySigner,
        event_id: i64,
        total_due: U256,
    ) -> Result<TxConfirmation>;

    /// Owner-signed `approve(marketplace, tokenId)` on the ticket contract.
    async fn approve_marketplace(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
    ) -> Result<TxConfirmation>;

    /// Seller-signed `listItem(tokenId, price)`.
    async fn list_item(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
        price: i64,
    ) -> Result<TxConfirmation>;

    /// Buyer-signed payable `buyItem(tokenId)` with `value = total_due`.
    async fn buy_item(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
        total_due: U256,
    ) -> Result<TxConfirmation>;

    /// Seller-signed `cancelListing(tokenId)`.
    async fn cancel_listing(
        &self,
        signer: PrivateKeySigner,
        token_id: i64,
    ) -> Result<TxConfirmation>;

    /// Owner-signed `safeTransferFrom(owner, to, tokenId)`.
    async fn transfer_token(
        &self,
        signer: PrivateKeySigner,
        to: Address,
        token_id: i64,
    ) -> Result<TxConfirmation>;

    /// Fetch the three marketplace log kinds for a block range, querying
    /// them concurrently (the one bounded fan-out in the system).
    async fn marketplace_logs(&self, from_block: i64, to_block: i64) -> Result<MarketLogPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_gateway_substitutes_for_the_trait() {
        let mut mock = MockChainGateway::new();
        mock.expect_fee_basis_points().returning(|| Ok(250));
        mock.expect_listing().returning(|_| {
            Ok(ChainListing {
                seller: Address::repeat_byte(0x11),
                price: 90,
                active: true,
            })
        });

        let gateway: &dyn ChainGateway = &mock;
        assert_eq!(gateway.fee_basis_points().await.unwrap(), 250);
        assert!(gateway.listing(1).await.unwrap().active);
    }
}
