#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Raffle Engine
///
/// **Role:** Slot ledger and round state machine for an NFT raffle. Accepts
/// one prize at a time from the Prize Custodian, sells numbered slots for a
/// fixed price, grants free slots earned from paid purchases, locks entry for
/// a seven day cool-down, requests a random value from an external oracle and
/// hands the prize to the owner of the selected slot.
///
/// ## Round Lifecycle
///
/// ```text
///   NoRound(-1) ──on_asset_received()──► Open(0)
///        ▲                                  │ enter_lock_period()   [owner]
///        │                                  ▼
///        │                              Locked (paused)
///        │                                  │ exit_lock_period()    [anyone, ≥ 7 days]
///        │                                  ▼
///        │                        AwaitingRandomness ──fulfill_randomness()── [oracle]
///        │                                  ▼
///        └──────── disburse_winner() ── ReadyToDisburse               [owner]
/// ```
///
/// `exit_lock_period` clears the pause flag as soon as the request is issued,
/// so purchases are accepted again while the oracle answer is outstanding.
///
/// ## Slot Arena
///
/// Slots are keyed by `(round, index)`. A refunded index goes onto a sorted
/// free list and is handed out again (lowest first) before the high-water
/// mark grows. Filled indices are therefore `[0, high_water)` minus the free
/// list, which lets winner selection map an ordinal to an index without
/// touching storage.
///
/// ## Free Slots
///
/// ```text
///   allowance = (carried_paid + paid) / 10 + 1 − free
/// ```
///
/// `carried_paid` accumulates the paid slots of every earlier round the
/// account entered; only paid slots ever grow the basis.
///
/// ## Bounds
///
/// ink! encodes storage cells, return values and events into a fixed 16 KiB
/// buffer. `max_slots` is capped at `MAX_SLOT_CAPACITY` so the free list and
/// per-purchase index lists fit, and `slot_owners` is paged by
/// `SLOT_PAGE_LIMIT`.
#[ink::contract]
mod raffle {
    use crate::constants::*;
    use ink::env::call::{build_call, ExecutionInput, Selector};
    use ink::env::hash::Blake2x256;
    use ink::env::DefaultEnvironment;
    use ink::prelude::string::String;
    use ink::prelude::vec::Vec;
    use ink::storage::Mapping;
    use raffle_nft::{AssetId, AssetReceiver, CustodianError, ReceiverError};

    // =========================================================================
    // TYPES
    // =========================================================================

    /// How a purchase is paid for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub enum PurchaseMode {
        /// `count × slot_price` attached to the call.
        Paid,
        /// Drawn from the account's free-slot allowance; no value attached.
        Free,
    }

    /// Where the current round stands in its lifecycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub enum RoundStatus {
        /// No prize held; waiting for the custodian.
        NoRound,
        /// Slots can be bought and refunded.
        Open,
        /// Cool-down running; purchases and refunds are paused.
        Locked,
        /// Request issued, oracle has not answered yet.
        AwaitingRandomness,
        /// Random value delivered; the owner can disburse.
        ReadyToDisburse,
    }

    /// The prize held for the current round.
    #[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct PrizeAsset {
        pub asset_id: AssetId,
        pub metadata_uri: String,
        /// Account that operated the custodian when the prize was sent.
        pub received_from: AccountId,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct Slot {
        pub owner: AccountId,
        pub purchased_at: Timestamp,
        /// `false` for slots drawn from the free allowance.
        pub paid: bool,
    }

    /// Per-account slot counters for one round.
    ///
    /// `free` is always `total − paid`. Stored entries are rolled over lazily
    /// the first time an account is touched in a new round.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct LedgerEntry {
        pub total: u32,
        pub paid: u32,
        pub free: u32,
        pub round: u32,
        /// Paid slots accumulated over earlier rounds.
        pub carried_paid: u32,
    }

    impl LedgerEntry {
        /// Most free slots the account may hold this round.
        pub fn free_slot_cap(&self) -> u32 {
            (self.carried_paid.saturating_add(self.paid) / FREE_SLOT_DIVISOR)
                .saturating_add(FREE_SLOT_BONUS)
        }

        pub fn free_allowance(&self) -> u32 {
            self.free_slot_cap().saturating_sub(self.free)
        }
    }

    /// Outcome of closing a round, before the prize leaves the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Settlement {
        winner: AccountId,
        asset_id: AssetId,
        slot_index: u32,
    }

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct Raffle {
        /// Deployer / admin.
        owner: AccountId,

        /// The only account allowed to change `treasury`.
        treasury_admin: AccountId,

        /// Receives the round pot on disbursement.
        treasury: AccountId,

        /// Custodian contract allowed to open rounds.
        prize_custodian: AccountId,

        // ── Randomness oracle ─────────────────────────────────────────────
        oracle: AccountId,
        key_hash: Hash,
        oracle_fee: Balance,
        /// Native value set aside for oracle fees, separate from the pot.
        oracle_funds: Balance,
        request_nonce: u64,
        pending_request: Option<Hash>,
        random_results: Mapping<Hash, u128>,

        // ── Round parameters ──────────────────────────────────────────────
        slot_price: Balance,
        max_slots: u32,

        // ── Round state ───────────────────────────────────────────────────
        /// Number of rounds opened so far; also the id of the current round.
        round: u32,
        prize: Option<PrizeAsset>,
        paused: bool,
        locked_at: Option<Timestamp>,
        /// Paid slot payments not refunded yet.
        round_pot: Balance,

        // ── Slot arena ────────────────────────────────────────────────────
        slots: Mapping<(u32, u32), Slot>,
        filled: u32,
        high_water: u32,
        /// Released indices below `high_water`, ascending.
        released: Vec<u32>,

        ledger: Mapping<AccountId, LedgerEntry>,

        /// Round → (winner, prize).
        winners: Mapping<u32, (AccountId, AssetId)>,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[ink(event)]
    pub struct RoundOpened {
        #[ink(topic)]
        round: u32,
        #[ink(topic)]
        asset_id: AssetId,
        operator: AccountId,
        metadata_uri: String,
    }

    #[ink(event)]
    pub struct SlotsClaimed {
        #[ink(topic)]
        round: u32,
        #[ink(topic)]
        buyer: AccountId,
        mode: PurchaseMode,
        slot_indices: Vec<u32>,
        payment: Balance,
    }

    #[ink(event)]
    pub struct SlotsRefunded {
        #[ink(topic)]
        round: u32,
        #[ink(topic)]
        owner: AccountId,
        slot_indices: Vec<u32>,
        refunded: Balance,
    }

    #[ink(event)]
    pub struct LockPeriodEntered {
        #[ink(topic)]
        round: u32,
        unlocks_at: Timestamp,
    }

    /// Outbound request picked up by the oracle.
    #[ink(event)]
    pub struct RandomnessRequested {
        #[ink(topic)]
        request_id: Hash,
        #[ink(topic)]
        round: u32,
        key_hash: Hash,
        fee: Balance,
    }

    #[ink(event)]
    pub struct RandomnessFulfilled {
        #[ink(topic)]
        request_id: Hash,
        value: u128,
    }

    #[ink(event)]
    pub struct OracleFunded {
        #[ink(topic)]
        from: AccountId,
        amount: Balance,
        oracle_funds: Balance,
    }

    #[ink(event)]
    pub struct WinnerDisbursed {
        #[ink(topic)]
        round: u32,
        #[ink(topic)]
        winner: AccountId,
        asset_id: AssetId,
        slot_index: u32,
        treasury_payout: Balance,
    }

    #[ink(event)]
    pub struct TreasuryUpdated {
        #[ink(topic)]
        treasury: AccountId,
    }

    #[ink(event)]
    pub struct OwnershipTransferred {
        #[ink(topic)]
        previous: AccountId,
        #[ink(topic)]
        new_owner: AccountId,
    }

    // =========================================================================
    // ERRORS
    // =========================================================================

    #[derive(Debug, PartialEq, Eq, Clone, Copy, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub enum Error {
        /// Caller is not the contract owner.
        NotOwner,
        /// Caller does not hold the treasury admin role.
        NotTreasuryAdmin,
        /// Caller is not the configured randomness oracle.
        NotOracle,
        /// Zero slot price or zero capacity.
        InvalidConfig,
        /// No prize is held, so no round is open.
        NoActiveRound,
        /// Configuration cannot change while a round is open.
        RoundInProgress,
        /// The round is locked.
        RafflePaused,
        /// A purchase or refund named no slots.
        ZeroSlots,
        /// Attached value does not match the price of the purchase.
        IncorrectPayment,
        /// Not enough unfilled slots left in the round.
        InsufficientSlots,
        /// The free-slot allowance does not cover the request.
        FreeSlotAllowanceExceeded,
        /// The refund would leave more free slots than the remaining paid
        /// slots allow.
        FreeSlotsExceedAllowance,
        /// The same slot index was listed twice.
        DuplicateSlot,
        /// The caller does not own a listed slot.
        SlotNotOwned,
        /// Slot arena and counters disagree.
        SlotNotFound,
        /// The round is already in its cool-down.
        AlreadyLocked,
        /// Unlock was called on a round that is not locked.
        NotLocked,
        /// The seven day cool-down has not elapsed.
        LockPeriodActive,
        /// The round already has a randomness request.
        RandomnessAlreadyRequested,
        /// The oracle fund cannot cover the request fee.
        InsufficientOracleFunds,
        /// The id does not match the round's pending request.
        UnknownRequest,
        /// The request was answered before.
        RequestAlreadyFulfilled,
        /// Disbursement before any randomness request.
        RandomnessNotRequested,
        /// Disbursement before the oracle answered.
        RandomnessNotReady,
        /// Disbursement with every slot empty.
        NoSlotsFilled,
        /// Arithmetic overflow.
        Overflow,
        /// A native value transfer failed.
        TransferFailed,
        /// The custodian refused to move the prize to the winner.
        PrizeTransferFailed,
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl Raffle {
        // ---------------------------------------------------------------------
        // Constructor
        // ---------------------------------------------------------------------

        #[ink(constructor)]
        #[allow(clippy::too_many_arguments)]
        pub fn new(
            treasury_admin: AccountId,
            treasury: AccountId,
            prize_custodian: AccountId,
            slot_price: Balance,
            key_hash: Hash,
            oracle: AccountId,
            oracle_fee: Balance,
            max_slots: u32,
        ) -> Result<Self, Error> {
            if slot_price == 0 || max_slots == 0 || max_slots > MAX_SLOT_CAPACITY {
                return Err(Error::InvalidConfig);
            }

            Ok(Self {
                owner: Self::env().caller(),
                treasury_admin,
                treasury,
                prize_custodian,
                oracle,
                key_hash,
                oracle_fee,
                oracle_funds: 0,
                request_nonce: 0,
                pending_request: None,
                random_results: Mapping::default(),
                slot_price,
                max_slots,
                round: 0,
                prize: None,
                paused: false,
                locked_at: None,
                round_pot: 0,
                slots: Mapping::default(),
                filled: 0,
                high_water: 0,
                released: Vec::new(),
                ledger: Mapping::default(),
                winners: Mapping::default(),
            })
        }

        // =====================================================================
        // SLOT PURCHASE
        // =====================================================================

        /// Buy `count` slots in the open round and return their indices.
        ///
        /// `Paid` purchases must attach exactly `count × slot_price`; `Free`
        /// purchases attach nothing and draw on the free-slot allowance.
        #[ink(message, payable)]
        pub fn purchase_slots(&mut self, count: u32, mode: PurchaseMode) -> Result<Vec<u32>, Error> {
            self.ensure_round_open()?;
            self.assert_not_paused()?;
            if count == 0 {
                return Err(Error::ZeroSlots);
            }

            let buyer = self.env().caller();
            let mut entry = self.current_entry(buyer);

            let cost = match mode {
                PurchaseMode::Paid => self
                    .slot_price
                    .checked_mul(Balance::from(count))
                    .ok_or(Error::Overflow)?,
                PurchaseMode::Free => {
                    if count > entry.free_allowance() {
                        return Err(Error::FreeSlotAllowanceExceeded);
                    }
                    0
                }
            };
            if self.env().transferred_value() != cost {
                return Err(Error::IncorrectPayment);
            }
            if count > self.slots_available() {
                return Err(Error::InsufficientSlots);
            }

            entry.total = entry.total.checked_add(count).ok_or(Error::Overflow)?;
            match mode {
                PurchaseMode::Paid => entry.paid = entry.paid.checked_add(count).ok_or(Error::Overflow)?,
                PurchaseMode::Free => entry.free = entry.free.checked_add(count).ok_or(Error::Overflow)?,
            }
            let filled = self.filled.checked_add(count).ok_or(Error::Overflow)?;
            let round_pot = self.round_pot.checked_add(cost).ok_or(Error::Overflow)?;

            let slot = Slot {
                owner: buyer,
                purchased_at: self.env().block_timestamp(),
                paid: mode == PurchaseMode::Paid,
            };
            let slot_indices = self.allocate(count);
            for index in &slot_indices {
                self.slots.insert((self.round, *index), &slot);
            }
            self.ledger.insert(buyer, &entry);
            self.filled = filled;
            self.round_pot = round_pot;

            self.env().emit_event(SlotsClaimed {
                round: self.round,
                buyer,
                mode,
                slot_indices: slot_indices.clone(),
                payment: cost,
            });

            Ok(slot_indices)
        }

        // =====================================================================
        // REFUND
        // =====================================================================

        /// Give back the listed slots. Paid slots return `slot_price` each,
        /// free slots return nothing. All-or-nothing: one slot the caller
        /// does not own fails the whole call.
        #[ink(message)]
        pub fn refund_slots(&mut self, slot_indices: Vec<u32>) -> Result<Balance, Error> {
            self.ensure_round_open()?;
            self.assert_not_paused()?;
            if slot_indices.is_empty() {
                return Err(Error::ZeroSlots);
            }

            let caller = self.env().caller();
            let mut indices = slot_indices;
            indices.sort_unstable();
            if indices.windows(2).any(|pair| pair[0] == pair[1]) {
                return Err(Error::DuplicateSlot);
            }

            let mut paid_count: u32 = 0;
            for index in &indices {
                let slot = self
                    .slots
                    .get((self.round, *index))
                    .ok_or(Error::SlotNotOwned)?;
                if slot.owner != caller {
                    return Err(Error::SlotNotOwned);
                }
                if slot.paid {
                    paid_count = paid_count.checked_add(1).ok_or(Error::Overflow)?;
                }
            }
            let count = u32::try_from(indices.len()).map_err(|_| Error::Overflow)?;
            let free_count = count.checked_sub(paid_count).ok_or(Error::Overflow)?;

            let mut entry = self.current_entry(caller);
            entry.total = entry.total.checked_sub(count).ok_or(Error::Overflow)?;
            entry.paid = entry.paid.checked_sub(paid_count).ok_or(Error::Overflow)?;
            entry.free = entry.free.checked_sub(free_count).ok_or(Error::Overflow)?;
            if entry.free > entry.free_slot_cap() {
                return Err(Error::FreeSlotsExceedAllowance);
            }

            let refunded = self
                .slot_price
                .checked_mul(Balance::from(paid_count))
                .ok_or(Error::Overflow)?;
            let round_pot = self.round_pot.checked_sub(refunded).ok_or(Error::Overflow)?;
            let filled = self.filled.checked_sub(count).ok_or(Error::Overflow)?;

            for index in &indices {
                self.slots.remove((self.round, *index));
                self.release(*index);
            }
            self.ledger.insert(caller, &entry);
            self.filled = filled;
            self.round_pot = round_pot;

            if refunded > 0 {
                self.env()
                    .transfer(caller, refunded)
                    .map_err(|_| Error::TransferFailed)?;
            }

            self.env().emit_event(SlotsRefunded {
                round: self.round,
                owner: caller,
                slot_indices: indices,
                refunded,
            });

            Ok(refunded)
        }

        // =====================================================================
        // LOCK PERIOD
        // =====================================================================

        #[ink(message)]
        pub fn enter_lock_period(&mut self) -> Result<(), Error> {
            self.only_owner()?;
            self.ensure_round_open()?;
            if self.paused {
                return Err(Error::AlreadyLocked);
            }
            if self.pending_request.is_some() {
                return Err(Error::RandomnessAlreadyRequested);
            }

            let now = self.env().block_timestamp();
            self.paused = true;
            self.locked_at = Some(now);

            self.env().emit_event(LockPeriodEntered {
                round: self.round,
                unlocks_at: now.saturating_add(LOCK_DURATION),
            });
            Ok(())
        }

        /// End the cool-down and request randomness. Callable by anyone once
        /// `LOCK_DURATION` has elapsed; returns the request id the oracle
        /// must answer.
        ///
        /// The pause flag is cleared here, before the value arrives.
        #[ink(message)]
        pub fn exit_lock_period(&mut self) -> Result<Hash, Error> {
            self.ensure_round_open()?;
            let unlocks_at = self.lock_ends_at().ok_or(Error::NotLocked)?;
            if self.env().block_timestamp() < unlocks_at {
                return Err(Error::LockPeriodActive);
            }
            let oracle_funds = self
                .oracle_funds
                .checked_sub(self.oracle_fee)
                .ok_or(Error::InsufficientOracleFunds)?;
            let nonce = self.request_nonce.checked_add(1).ok_or(Error::Overflow)?;

            let request_id = self.derive_request_id(nonce);
            self.request_nonce = nonce;
            self.oracle_funds = oracle_funds;
            self.pending_request = Some(request_id);
            self.paused = false;
            self.locked_at = None;

            if self.oracle_fee > 0 {
                self.env()
                    .transfer(self.oracle, self.oracle_fee)
                    .map_err(|_| Error::TransferFailed)?;
            }

            self.env().emit_event(RandomnessRequested {
                request_id,
                round: self.round,
                key_hash: self.key_hash,
                fee: self.oracle_fee,
            });

            Ok(request_id)
        }

        // =====================================================================
        // RANDOMNESS
        // =====================================================================

        /// Top up the fund that pays oracle fees.
        #[ink(message, payable)]
        pub fn fund_oracle(&mut self) -> Result<(), Error> {
            let amount = self.env().transferred_value();
            if amount == 0 {
                return Err(Error::IncorrectPayment);
            }
            self.oracle_funds = self.oracle_funds.checked_add(amount).ok_or(Error::Overflow)?;

            self.env().emit_event(OracleFunded {
                from: self.env().caller(),
                amount,
                oracle_funds: self.oracle_funds,
            });
            Ok(())
        }

        /// Oracle callback. Each request is answered at most once.
        #[ink(message)]
        pub fn fulfill_randomness(&mut self, request_id: Hash, value: u128) -> Result<(), Error> {
            if self.env().caller() != self.oracle {
                return Err(Error::NotOracle);
            }
            if self.random_results.contains(request_id) {
                return Err(Error::RequestAlreadyFulfilled);
            }
            if self.pending_request != Some(request_id) {
                return Err(Error::UnknownRequest);
            }

            self.random_results.insert(request_id, &value);

            self.env().emit_event(RandomnessFulfilled { request_id, value });
            Ok(())
        }

        // =====================================================================
        // DISBURSEMENT
        // =====================================================================

        /// Pick the winner with the delivered random value, pay the pot to
        /// the treasury, close the round and send the prize to the winner.
        #[ink(message)]
        pub fn disburse_winner(&mut self) -> Result<AccountId, Error> {
            self.only_owner()?;
            self.ensure_round_open()?;
            let request_id = self.pending_request.ok_or(Error::RandomnessNotRequested)?;
            let random = self
                .random_results
                .get(request_id)
                .ok_or(Error::RandomnessNotReady)?;
            if self.filled == 0 {
                return Err(Error::NoSlotsFilled);
            }

            let settlement = self.settle_round(random)?;
            self.release_prize(settlement.winner, settlement.asset_id)?;

            Ok(settlement.winner)
        }

        // =====================================================================
        // INTERNAL: Round Bookkeeping
        // =====================================================================

        fn settle_round(&mut self, random: u128) -> Result<Settlement, Error> {
            let prize = self.prize.clone().ok_or(Error::NoActiveRound)?;
            if self.filled == 0 {
                return Err(Error::NoSlotsFilled);
            }

            let ordinal = u32::try_from(random % u128::from(self.filled)).map_err(|_| Error::Overflow)?;
            let slot_index = Self::nth_filled_index(&self.released, ordinal);
            let slot = self
                .slots
                .get((self.round, slot_index))
                .ok_or(Error::SlotNotFound)?;
            let payout = self.round_pot;
            let round = self.round;

            self.winners.insert(round, &(slot.owner, prize.asset_id));
            self.reset_round();

            if payout > 0 {
                self.env()
                    .transfer(self.treasury, payout)
                    .map_err(|_| Error::TransferFailed)?;
            }

            self.env().emit_event(WinnerDisbursed {
                round,
                winner: slot.owner,
                asset_id: prize.asset_id,
                slot_index,
                treasury_payout: payout,
            });

            Ok(Settlement {
                winner: slot.owner,
                asset_id: prize.asset_id,
                slot_index,
            })
        }

        /// Clear everything scoped to the round. Ledger entries stay; they
        /// are the free-slot basis of the next round.
        fn reset_round(&mut self) {
            self.prize = None;
            self.paused = false;
            self.locked_at = None;
            self.pending_request = None;
            self.round_pot = 0;
            self.filled = 0;
            self.high_water = 0;
            self.released.clear();
        }

        /// Ledger entry as seen from the current round.
        fn current_entry(&self, account: AccountId) -> LedgerEntry {
            match self.ledger.get(account) {
                Some(entry) if entry.round == self.round => entry,
                Some(stale) => LedgerEntry {
                    round: self.round,
                    carried_paid: stale.carried_paid.saturating_add(stale.paid),
                    ..Default::default()
                },
                None => LedgerEntry {
                    round: self.round,
                    ..Default::default()
                },
            }
        }

        // =====================================================================
        // INTERNAL: Slot Arena
        // =====================================================================

        /// Hand out `count` indices: released ones first, lowest first, then
        /// fresh ones from the high-water mark. Capacity is checked by the
        /// caller.
        fn allocate(&mut self, count: u32) -> Vec<u32> {
            let reused = core::cmp::min(count as usize, self.released.len());
            let mut indices: Vec<u32> = self.released.drain(..reused).collect();

            let fresh = count.saturating_sub(reused as u32);
            indices.extend(self.high_water..self.high_water.saturating_add(fresh));
            self.high_water = self.high_water.saturating_add(fresh);

            indices
        }

        fn release(&mut self, index: u32) {
            if let Err(position) = self.released.binary_search(&index) {
                self.released.insert(position, index);
            }
        }

        /// Index of the `ordinal`-th filled slot, counting from zero, given
        /// the ascending list of released indices.
        fn nth_filled_index(released: &[u32], ordinal: u32) -> u32 {
            let mut index = ordinal;
            for &gap in released {
                if gap > index {
                    break;
                }
                index = index.saturating_add(1);
            }
            index
        }

        // =====================================================================
        // INTERNAL: Oracle & Custodian
        // =====================================================================

        fn derive_request_id(&self, nonce: u64) -> Hash {
            let seed = (self.key_hash, self.env().account_id(), self.round, nonce);
            Hash::from(self.env().hash_encoded::<Blake2x256, _>(&seed))
        }

        fn release_prize(&self, winner: AccountId, asset_id: AssetId) -> Result<(), Error> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.prize_custodian)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!("transfer_asset")))
                        .push_arg(winner)
                        .push_arg(asset_id),
                )
                .returns::<Result<(), CustodianError>>()
                .try_invoke();

            Self::prize_release_outcome(result)
        }

        /// Collapse the nested call result. Any failure surfaces as
        /// `PrizeTransferFailed`, which reverts the settlement.
        fn prize_release_outcome(
            result: ink::env::Result<ink::MessageResult<Result<(), CustodianError>>>,
        ) -> Result<(), Error> {
            match result {
                Ok(Ok(Ok(()))) => Ok(()),
                _ => Err(Error::PrizeTransferFailed),
            }
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        /// `-1` while no prize is held, `0` while a round is open.
        #[ink(message)]
        pub fn current_phase(&self) -> i8 {
            if self.prize.is_some() {
                PHASE_OPEN
            } else {
                PHASE_NO_ROUND
            }
        }

        #[ink(message)]
        pub fn round_status(&self) -> RoundStatus {
            if self.prize.is_none() {
                return RoundStatus::NoRound;
            }
            if self.paused {
                return RoundStatus::Locked;
            }
            match self.pending_request {
                None => RoundStatus::Open,
                Some(request_id) if self.random_results.contains(request_id) => {
                    RoundStatus::ReadyToDisburse
                }
                Some(_) => RoundStatus::AwaitingRandomness,
            }
        }

        #[ink(message)]
        pub fn round_number(&self) -> u32 {
            self.round
        }

        #[ink(message)]
        pub fn prize(&self) -> Option<PrizeAsset> {
            self.prize.clone()
        }

        #[ink(message)]
        pub fn max_slots(&self) -> u32 {
            self.max_slots
        }

        #[ink(message)]
        pub fn slots_available(&self) -> u32 {
            self.max_slots.saturating_sub(self.filled)
        }

        #[ink(message)]
        pub fn slots_filled(&self) -> u32 {
            self.filled
        }

        #[ink(message)]
        pub fn slot_price(&self) -> Balance {
            self.slot_price
        }

        /// Raw stored `(total, paid, round)` for `account`. May still carry
        /// an earlier round's numbers; see `account_ledger`.
        #[ink(message)]
        pub fn slots_owned(&self, account: AccountId) -> (u32, u32, u32) {
            self.ledger
                .get(account)
                .map(|entry| (entry.total, entry.paid, entry.round))
                .unwrap_or_default()
        }

        #[ink(message)]
        pub fn account_ledger(&self, account: AccountId) -> LedgerEntry {
            self.current_entry(account)
        }

        #[ink(message)]
        pub fn free_slot_allowance(&self, account: AccountId) -> u32 {
            self.current_entry(account).free_allowance()
        }

        #[ink(message)]
        pub fn paused(&self) -> bool {
            self.paused
        }

        #[ink(message)]
        pub fn lock_ends_at(&self) -> Option<Timestamp> {
            self.locked_at.map(|at| at.saturating_add(LOCK_DURATION))
        }

        /// Random value delivered for the current round's request, 0 until
        /// it arrives.
        #[ink(message)]
        pub fn random_result(&self) -> u128 {
            self.pending_request
                .and_then(|request_id| self.random_results.get(request_id))
                .unwrap_or(0)
        }

        #[ink(message)]
        pub fn random_result_of(&self, request_id: Hash) -> Option<u128> {
            self.random_results.get(request_id)
        }

        #[ink(message)]
        pub fn pending_request(&self) -> Option<Hash> {
            self.pending_request
        }

        /// Owners of indices `from..from + len` below the high-water mark,
        /// `None` for released slots. At most `SLOT_PAGE_LIMIT` entries.
        #[ink(message)]
        pub fn slot_owners(&self, from: u32, len: u32) -> Vec<Option<AccountId>> {
            let end = from
                .saturating_add(core::cmp::min(len, SLOT_PAGE_LIMIT))
                .min(self.high_water);
            (from..end)
                .map(|index| self.slots.get((self.round, index)).map(|slot| slot.owner))
                .collect()
        }

        /// One past the highest index handed out this round.
        #[ink(message)]
        pub fn slot_high_water(&self) -> u32 {
            self.high_water
        }

        #[ink(message)]
        pub fn slot(&self, index: u32) -> Option<Slot> {
            self.slots.get((self.round, index))
        }

        #[ink(message)]
        pub fn winner_of(&self, round: u32) -> Option<(AccountId, AssetId)> {
            self.winners.get(round)
        }

        #[ink(message)]
        pub fn round_pot(&self) -> Balance {
            self.round_pot
        }

        #[ink(message)]
        pub fn oracle_funds(&self) -> Balance {
            self.oracle_funds
        }

        #[ink(message)]
        pub fn owner(&self) -> AccountId {
            self.owner
        }

        #[ink(message)]
        pub fn treasury(&self) -> AccountId {
            self.treasury
        }

        #[ink(message)]
        pub fn treasury_admin(&self) -> AccountId {
            self.treasury_admin
        }

        #[ink(message)]
        pub fn oracle(&self) -> AccountId {
            self.oracle
        }

        #[ink(message)]
        pub fn prize_custodian(&self) -> AccountId {
            self.prize_custodian
        }

        // =====================================================================
        // ADMIN
        // =====================================================================

        #[ink(message)]
        pub fn set_treasury(&mut self, treasury: AccountId) -> Result<(), Error> {
            if self.env().caller() != self.treasury_admin {
                return Err(Error::NotTreasuryAdmin);
            }
            self.treasury = treasury;
            self.env().emit_event(TreasuryUpdated { treasury });
            Ok(())
        }

        #[ink(message)]
        pub fn set_slot_price(&mut self, slot_price: Balance) -> Result<(), Error> {
            self.only_owner()?;
            self.ensure_no_round()?;
            if slot_price == 0 {
                return Err(Error::InvalidConfig);
            }
            self.slot_price = slot_price;
            Ok(())
        }

        #[ink(message)]
        pub fn set_max_slots(&mut self, max_slots: u32) -> Result<(), Error> {
            self.only_owner()?;
            self.ensure_no_round()?;
            if max_slots == 0 || max_slots > MAX_SLOT_CAPACITY {
                return Err(Error::InvalidConfig);
            }
            self.max_slots = max_slots;
            Ok(())
        }

        #[ink(message)]
        pub fn set_randomness_config(
            &mut self,
            oracle: AccountId,
            key_hash: Hash,
            oracle_fee: Balance,
        ) -> Result<(), Error> {
            self.only_owner()?;
            self.ensure_no_round()?;
            self.oracle = oracle;
            self.key_hash = key_hash;
            self.oracle_fee = oracle_fee;
            Ok(())
        }

        #[ink(message)]
        pub fn transfer_ownership(&mut self, new_owner: AccountId) -> Result<(), Error> {
            self.only_owner()?;
            let previous = self.owner;
            self.owner = new_owner;
            self.env().emit_event(OwnershipTransferred { previous, new_owner });
            Ok(())
        }

        // =====================================================================
        // ACCESS CONTROL
        // =====================================================================

        fn only_owner(&self) -> Result<(), Error> {
            if self.env().caller() != self.owner {
                return Err(Error::NotOwner);
            }
            Ok(())
        }

        fn ensure_round_open(&self) -> Result<(), Error> {
            if self.prize.is_none() {
                return Err(Error::NoActiveRound);
            }
            Ok(())
        }

        fn ensure_no_round(&self) -> Result<(), Error> {
            if self.prize.is_some() {
                return Err(Error::RoundInProgress);
            }
            Ok(())
        }

        fn assert_not_paused(&self) -> Result<(), Error> {
            if self.paused {
                return Err(Error::RafflePaused);
            }
            Ok(())
        }
    }

    // =========================================================================
    // PRIZE INTAKE (custodian hook)
    // =========================================================================

    impl AssetReceiver for Raffle {
        /// Open a new round around the asset the custodian just minted to us.
        #[ink(message)]
        fn on_asset_received(
            &mut self,
            operator: AccountId,
            asset_id: AssetId,
            metadata_uri: String,
        ) -> Result<(), ReceiverError> {
            if self.env().caller() != self.prize_custodian {
                return Err(ReceiverError::NotCustodian);
            }
            if self.prize.is_some() {
                return Err(ReceiverError::AssetAlreadyHeld);
            }

            self.round = self.round.saturating_add(1);
            self.prize = Some(PrizeAsset {
                asset_id,
                metadata_uri: metadata_uri.clone(),
                received_from: operator,
            });

            self.env().emit_event(RoundOpened {
                round: self.round,
                asset_id,
                operator,
                metadata_uri,
            });
            Ok(())
        }

        #[ink(message)]
        fn is_asset_held(&self) -> bool {
            self.prize.is_some()
        }
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================

}

pub mod constants {
    /// Cool-down between locking and unlocking a round: 7 days in milliseconds.
    pub const LOCK_DURATION: u64 = 7 * 24 * 60 * 60 * 1_000;

    /// One free slot per this many paid slots.
    pub const FREE_SLOT_DIVISOR: u32 = 10;

    /// Free slots every account may claim regardless of paid slots.
    pub const FREE_SLOT_BONUS: u32 = 1;

    /// Upper bound for `max_slots`. Keeps the released-index list (4 bytes
    /// per index) and a full-round `SlotsClaimed` index list inside the
    /// 16 KiB buffer.
    pub const MAX_SLOT_CAPACITY: u32 = 2_000;

    /// Most entries `slot_owners` returns per call (33 encoded bytes each).
    pub const SLOT_PAGE_LIMIT: u32 = 250;

    pub const PHASE_NO_ROUND: i8 = -1;
    pub const PHASE_OPEN: i8 = 0;
}
