//! Balance rules.
//!
//! These operate on in-memory [`Balances`] snapshots taken under a row lock.
//! Each rule either applies completely or leaves the snapshot untouched, so
//! a failed rule never needs compensating. Callers validate that amounts are
//! strictly positive before calling in.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{Amount, Balances},
};

impl Balances {
    /// Take `amount` out of the wallet
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - wallet holds less than `amount`
    pub fn debit_wallet(&mut self, amount: Amount) -> LedgerResult<()> {
        if self.wallet < amount {
            return Err(LedgerError::InsufficientFunds {
                available: self.wallet,
                required: amount,
            });
        }
        self.wallet -= amount;
        Ok(())
    }

    /// Add `amount` to the wallet
    pub fn credit_wallet(&mut self, amount: Amount) -> LedgerResult<()> {
        self.wallet = self
            .wallet
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        Ok(())
    }

    /// Move `amount` from the wallet into escrow
    pub fn move_to_escrow(&mut self, amount: Amount) -> LedgerResult<()> {
        let escrow = self
            .escrow
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        self.debit_wallet(amount)?;
        self.escrow = escrow;
        Ok(())
    }

    /// Take `amount` out of escrow without crediting anyone
    ///
    /// # Errors
    ///
    /// * `LedgerError::EscrowUnderflow` - escrow holds less than `amount`
    pub fn debit_escrow(&mut self, amount: Amount) -> LedgerResult<()> {
        if self.escrow < amount {
            return Err(LedgerError::EscrowUnderflow {
                held: self.escrow,
                required: amount,
            });
        }
        self.escrow -= amount;
        Ok(())
    }

    /// Return `amount` from escrow to the wallet
    pub fn refund_escrow(&mut self, amount: Amount) -> LedgerResult<()> {
        let wallet = self
            .wallet
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        self.debit_escrow(amount)?;
        self.wallet = wallet;
        Ok(())
    }
}

/// Pay `amount` out of the buyer's escrow into the seller's wallet
///
/// # Errors
///
/// * `LedgerError::EscrowUnderflow` - buyer escrow holds less than `amount`
/// * `LedgerError::BalanceOverflow` - seller wallet would overflow
pub fn release_escrow_to_seller(
    buyer: &mut Balances,
    seller: &mut Balances,
    amount: Amount,
) -> LedgerResult<()> {
    let seller_wallet = seller
        .wallet
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow)?;
    buyer.debit_escrow(amount)?;
    seller.wallet = seller_wallet;
    Ok(())
}

/// Return `amount` from the buyer's escrow to the buyer's wallet
pub fn refund_escrow_to_buyer(buyer: &mut Balances, amount: Amount) -> LedgerResult<()> {
    buyer.refund_escrow(amount)
}

/// Reject zero and negative amounts
pub fn ensure_positive(amount: Amount) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_wallet_insufficient_leaves_balances() {
        let mut balances = Balances::new(5000, 0);
        let err = balances.debit_wallet(6000).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                available: 5000,
                required: 6000
            }
        ));
        assert_eq!(balances, Balances::new(5000, 0));
    }

    #[test]
    fn test_move_to_escrow() {
        let mut balances = Balances::new(10_000, 0);
        balances.move_to_escrow(6000).unwrap();
        assert_eq!(balances, Balances::new(4000, 6000));
        assert_eq!(balances.total(), 10_000);
    }

    #[test]
    fn test_move_to_escrow_failure_rolls_back() {
        let mut balances = Balances::new(100, 50);
        assert!(balances.move_to_escrow(101).is_err());
        assert_eq!(balances, Balances::new(100, 50));
    }

    #[test]
    fn test_move_then_refund_restores_split() {
        let mut balances = Balances::new(250, 40);
        balances.move_to_escrow(100).unwrap();
        refund_escrow_to_buyer(&mut balances, 100).unwrap();
        assert_eq!(balances, Balances::new(250, 40));
    }

    #[test]
    fn test_release_escrow_to_seller() {
        let mut buyer = Balances::new(4000, 6000);
        let mut seller = Balances::new(1000, 0);
        release_escrow_to_seller(&mut buyer, &mut seller, 6000).unwrap();
        assert_eq!(buyer, Balances::new(4000, 0));
        assert_eq!(seller, Balances::new(7000, 0));
    }

    #[test]
    fn test_release_escrow_underflow_changes_nothing() {
        let mut buyer = Balances::new(0, 10);
        let mut seller = Balances::new(5, 0);
        let err = release_escrow_to_seller(&mut buyer, &mut seller, 11).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(buyer, Balances::new(0, 10));
        assert_eq!(seller, Balances::new(5, 0));
    }

    #[test]
    fn test_credit_wallet_overflow() {
        let mut balances = Balances::new(Amount::MAX, 0);
        assert!(matches!(
            balances.credit_wallet(1),
            Err(LedgerError::BalanceOverflow)
        ));
        assert_eq!(balances.wallet, Amount::MAX);
    }

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive(1).is_ok());
        assert!(matches!(ensure_positive(0), Err(LedgerError::InvalidAmount(0))));
        assert!(ensure_positive(-5).is_err());
    }
}
