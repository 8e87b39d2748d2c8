#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Raffle NFT: Prize Custodian
///
/// **Role:** Minimal non-fungible ledger that owns prize assets and hands
/// them to the Raffle Engine, one asset per round.
///
/// **Architecture:**
/// ```text
///   [Raffle NFT] ──send_to_raffle()──► mint to engine ──► on_asset_received() XCC
///         ▲                                                      │
///         └──────────── transfer_asset(winner) XCC ◄── disburse ─┘
/// ```
///
/// The engine side of the handshake is the `AssetReceiver` trait below.
/// It lives in this crate so the engine can implement it and both contracts
/// decode the same error layouts across the call boundary.
use ink::prelude::string::String;
use ink::primitives::AccountId;

/// Identifier of a prize asset.
pub type AssetId = u32;

/// Errors returned by the custodian.
#[derive(Debug, PartialEq, Eq, Clone, Copy, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum CustodianError {
    /// Caller is not the custodian owner.
    NotOwner,
    /// Caller does not hold the asset it tries to move.
    NotAssetOwner,
    /// An asset with this id has already been minted.
    AssetExists,
    /// No asset with this id exists.
    AssetNotFound,
    /// The receiver already holds a prize.
    ReceiverBusy,
    /// The receiver refused the asset or could not be reached.
    ReceiverRejected,
    /// Arithmetic overflow.
    Overflow,
}

/// Reasons a receiver refuses an incoming asset.
#[derive(Debug, PartialEq, Eq, Clone, Copy, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum ReceiverError {
    /// The receiver already holds an asset.
    AssetAlreadyHeld,
    /// The call did not come from the receiver's configured custodian.
    NotCustodian,
}

/// Hook implemented by contracts that accept prize assets from the custodian.
#[ink::trait_definition]
pub trait AssetReceiver {
    /// Called by the custodian right after `asset_id` was minted to the receiver.
    #[ink(message)]
    fn on_asset_received(
        &mut self,
        operator: AccountId,
        asset_id: AssetId,
        metadata_uri: String,
    ) -> Result<(), ReceiverError>;

    /// Whether the receiver currently holds an asset.
    #[ink(message)]
    fn is_asset_held(&self) -> bool;
}

#[ink::contract]
mod raffle_nft {
    use super::{AssetId, CustodianError, ReceiverError};
    use ink::env::call::{build_call, ExecutionInput, Selector};
    use ink::env::DefaultEnvironment;
    use ink::prelude::string::String;
    use ink::storage::Mapping;

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct RaffleNft {
        /// Deployer; the only account allowed to mint prizes.
        owner: AccountId,

        /// Asset id → current holder.
        asset_owner: Mapping<AssetId, AccountId>,

        /// Asset id → metadata URI supplied at mint time.
        asset_uri: Mapping<AssetId, String>,

        /// Holder → number of assets held.
        balances: Mapping<AccountId, u32>,

        total_minted: u32,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Emitted on mint (`from = None`) and on every transfer.
    #[ink(event)]
    pub struct Transfer {
        #[ink(topic)]
        from: Option<AccountId>,
        #[ink(topic)]
        to: Option<AccountId>,
        #[ink(topic)]
        asset_id: AssetId,
    }

    /// Emitted once a prize has been minted to a raffle and accepted by it.
    #[ink(event)]
    pub struct AssetSent {
        #[ink(topic)]
        raffle: AccountId,
        asset_id: AssetId,
        metadata_uri: String,
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl RaffleNft {
        #[ink(constructor)]
        pub fn new() -> Self {
            Self {
                owner: Self::env().caller(),
                asset_owner: Mapping::default(),
                asset_uri: Mapping::default(),
                balances: Mapping::default(),
                total_minted: 0,
            }
        }

        // =====================================================================
        // PRIZE INTAKE
        // =====================================================================

        /// Mint `asset_id` straight to `raffle` and open a round there.
        ///
        /// The raffle is asked first whether it already holds a prize, so a
        /// busy raffle never receives a second asset. The whole message is
        /// reverted if the raffle rejects the hook.
        #[ink(message)]
        pub fn send_to_raffle(
            &mut self,
            raffle: AccountId,
            asset_id: AssetId,
            metadata_uri: String,
        ) -> Result<(), CustodianError> {
            self.only_owner()?;
            if self.asset_owner.contains(asset_id) {
                return Err(CustodianError::AssetExists);
            }
            if self.receiver_holds_asset(raffle)? {
                return Err(CustodianError::ReceiverBusy);
            }

            self.mint(raffle, asset_id, metadata_uri.clone())?;
            self.notify_receiver(raffle, asset_id, metadata_uri.clone())?;

            self.env().emit_event(AssetSent {
                raffle,
                asset_id,
                metadata_uri,
            });
            Ok(())
        }

        // =====================================================================
        // TRANSFERS
        // =====================================================================

        /// Move `asset_id` to `to`. Only the current holder may call this;
        /// the raffle uses it to pay out the winner.
        #[ink(message)]
        pub fn transfer_asset(&mut self, to: AccountId, asset_id: AssetId) -> Result<(), CustodianError> {
            let from = self
                .asset_owner
                .get(asset_id)
                .ok_or(CustodianError::AssetNotFound)?;
            if self.env().caller() != from {
                return Err(CustodianError::NotAssetOwner);
            }
            self.move_asset(from, to, asset_id)
        }

        // =====================================================================
        // INTERNAL: Ledger
        // =====================================================================

        fn mint(&mut self, to: AccountId, asset_id: AssetId, metadata_uri: String) -> Result<(), CustodianError> {
            if self.asset_owner.contains(asset_id) {
                return Err(CustodianError::AssetExists);
            }
            let held = self.balance_of(to).checked_add(1).ok_or(CustodianError::Overflow)?;
            self.total_minted = self.total_minted.checked_add(1).ok_or(CustodianError::Overflow)?;

            self.asset_owner.insert(asset_id, &to);
            self.asset_uri.insert(asset_id, &metadata_uri);
            self.balances.insert(to, &held);

            self.env().emit_event(Transfer {
                from: None,
                to: Some(to),
                asset_id,
            });
            Ok(())
        }

        fn move_asset(&mut self, from: AccountId, to: AccountId, asset_id: AssetId) -> Result<(), CustodianError> {
            if from != to {
                let from_held = self.balance_of(from).checked_sub(1).ok_or(CustodianError::Overflow)?;
                let to_held = self.balance_of(to).checked_add(1).ok_or(CustodianError::Overflow)?;
                self.balances.insert(from, &from_held);
                self.balances.insert(to, &to_held);
                self.asset_owner.insert(asset_id, &to);
            }

            self.env().emit_event(Transfer {
                from: Some(from),
                to: Some(to),
                asset_id,
            });
            Ok(())
        }

        // =====================================================================
        // INTERNAL: Cross-Contract Calls
        // =====================================================================

        fn receiver_holds_asset(&self, receiver: AccountId) -> Result<bool, CustodianError> {
            let result = build_call::<DefaultEnvironment>()
                .call(receiver)
                .exec_input(ExecutionInput::new(Selector::new(ink::selector_bytes!(
                    "AssetReceiver::is_asset_held"
                ))))
                .returns::<bool>()
                .try_invoke();

            match result {
                Ok(Ok(held)) => Ok(held),
                _ => Err(CustodianError::ReceiverRejected),
            }
        }

        fn notify_receiver(
            &self,
            receiver: AccountId,
            asset_id: AssetId,
            metadata_uri: String,
        ) -> Result<(), CustodianError> {
            let result = build_call::<DefaultEnvironment>()
                .call(receiver)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!(
                        "AssetReceiver::on_asset_received"
                    )))
                    .push_arg(self.env().caller())
                    .push_arg(asset_id)
                    .push_arg(metadata_uri),
                )
                .returns::<Result<(), ReceiverError>>()
                .try_invoke();

            match result {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(ReceiverError::AssetAlreadyHeld))) => Err(CustodianError::ReceiverBusy),
                _ => Err(CustodianError::ReceiverRejected),
            }
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        #[ink(message)]
        pub fn owner_of(&self, asset_id: AssetId) -> Option<AccountId> {
            self.asset_owner.get(asset_id)
        }

        #[ink(message)]
        pub fn token_uri(&self, asset_id: AssetId) -> Option<String> {
            self.asset_uri.get(asset_id)
        }

        #[ink(message)]
        pub fn balance_of(&self, holder: AccountId) -> u32 {
            self.balances.get(holder).unwrap_or(0)
        }

        #[ink(message)]
        pub fn total_minted(&self) -> u32 {
            self.total_minted
        }

        #[ink(message)]
        pub fn owner(&self) -> AccountId {
            self.owner
        }

        // =====================================================================
        // ACCESS CONTROL
        // =====================================================================

        fn only_owner(&self) -> Result<(), CustodianError> {
            if self.env().caller() != self.owner {
                return Err(CustodianError::NotOwner);
            }
            Ok(())
        }
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================

}
