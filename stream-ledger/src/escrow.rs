//! Escrow gateway
//!
//! The ledger moves tokens only through a [`TokenGateway`]: `pull` takes a
//! deposit from its owner into escrow, `pay`/`pay_all` release escrowed funds.
//! Every call is scoped to one token.
//!
//! [`InMemoryTokenGateway`] keeps one book per token behind a `DashMap`
//! entry, so a multi-payout release holds a single entry lock and either
//! applies every payout or none.

use crate::{
    error::{Error, Result},
    types::{Address, Amount},
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// One release from escrow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    /// Recipient
    pub recipient: Address,
    /// Amount in base units
    pub amount: Amount,
}

impl Payout {
    /// Create payout
    pub fn new(recipient: Address, amount: Amount) -> Self {
        Self { recipient, amount }
    }
}

/// Token transfer capability consumed by the ledger
pub trait TokenGateway: Send + Sync {
    /// Move `amount` of `token` from `owner` into escrow
    fn pull(&self, token: &Address, owner: &Address, amount: Amount) -> Result<()>;

    /// Release `amount` of `token` from escrow to `recipient`
    fn pay(&self, token: &Address, recipient: &Address, amount: Amount) -> Result<()>;

    /// Release several payouts of `token`; all succeed or none are applied
    fn pay_all(&self, token: &Address, payouts: &[Payout]) -> Result<()>;
}

impl<G: TokenGateway + ?Sized> TokenGateway for Arc<G> {
    fn pull(&self, token: &Address, owner: &Address, amount: Amount) -> Result<()> {
        (**self).pull(token, owner, amount)
    }

    fn pay(&self, token: &Address, recipient: &Address, amount: Amount) -> Result<()> {
        (**self).pay(token, recipient, amount)
    }

    fn pay_all(&self, token: &Address, payouts: &[Payout]) -> Result<()> {
        (**self).pay_all(token, payouts)
    }
}

/// Holder balances and escrowed total for one token
#[derive(Debug, Default)]
struct TokenBook {
    holders: HashMap<Address, Amount>,
    escrowed: Amount,
}

impl TokenBook {
    fn credit(&mut self, holder: &Address, amount: Amount) -> Result<()> {
        let balance = self.holders.entry(holder.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| Error::AmountOverflow(format!("balance of {} overflows", holder)))?;
        Ok(())
    }
}

/// Process-local token balances with an escrow account per token
#[derive(Debug, Default)]
pub struct InMemoryTokenGateway {
    books: DashMap<Address, TokenBook>,
}

impl InMemoryTokenGateway {
    /// Create empty gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `holder` out of thin air
    pub fn mint(&self, token: &Address, holder: &Address, amount: Amount) -> Result<()> {
        self.books
            .entry(token.clone())
            .or_default()
            .credit(holder, amount)
    }

    /// Spendable balance of `holder`
    pub fn balance_of(&self, token: &Address, holder: &Address) -> Amount {
        self.books
            .get(token)
            .and_then(|book| book.holders.get(holder).copied())
            .unwrap_or(0)
    }

    /// Total of `token` currently held in escrow
    pub fn escrowed(&self, token: &Address) -> Amount {
        self.books.get(token).map(|book| book.escrowed).unwrap_or(0)
    }
}

impl TokenGateway for InMemoryTokenGateway {
    fn pull(&self, token: &Address, owner: &Address, amount: Amount) -> Result<()> {
        let mut book = self
            .books
            .get_mut(token)
            .ok_or_else(|| Error::Transfer(format!("{} holds no {}", owner, token)))?;
        let available = book.holders.get(owner).copied().unwrap_or(0);
        if available < amount {
            return Err(Error::Transfer(format!(
                "{} holds {} of {}, needs {}",
                owner, available, token, amount
            )));
        }

        let escrowed = book
            .escrowed
            .checked_add(amount)
            .ok_or_else(|| Error::AmountOverflow(format!("escrow of {} overflows", token)))?;

        book.holders.insert(owner.clone(), available - amount);
        book.escrowed = escrowed;

        tracing::debug!(%token, %owner, amount = %amount, "Pulled into escrow");
        Ok(())
    }

    fn pay(&self, token: &Address, recipient: &Address, amount: Amount) -> Result<()> {
        self.pay_all(token, &[Payout::new(recipient.clone(), amount)])
    }

    fn pay_all(&self, token: &Address, payouts: &[Payout]) -> Result<()> {
        let total = payouts
            .iter()
            .try_fold(0 as Amount, |acc, payout| acc.checked_add(payout.amount))
            .ok_or_else(|| Error::AmountOverflow("payout total overflows".to_string()))?;

        let mut book = self
            .books
            .get_mut(token)
            .ok_or_else(|| Error::Transfer(format!("no escrow held for {}", token)))?;

        if book.escrowed < total {
            return Err(Error::Transfer(format!(
                "escrow of {} holds {}, payouts need {}",
                token, book.escrowed, total
            )));
        }

        // Sum per recipient, then compute every new balance before touching the book
        let mut owed: HashMap<&Address, Amount> = HashMap::new();
        for payout in payouts {
            let entry = owed.entry(&payout.recipient).or_insert(0);
            *entry = entry.checked_add(payout.amount).ok_or_else(|| {
                Error::AmountOverflow(format!("payouts to {} overflow", payout.recipient))
            })?;
        }

        let mut credited = Vec::with_capacity(owed.len());
        for (recipient, amount) in owed {
            let balance = book.holders.get(recipient).copied().unwrap_or(0);
            let updated = balance.checked_add(amount).ok_or_else(|| {
                Error::AmountOverflow(format!("balance of {} overflows", recipient))
            })?;
            credited.push((recipient.clone(), updated));
        }

        book.escrowed -= total;
        book.holders.extend(credited);

        tracing::debug!(%token, payouts = payouts.len(), total = %total, "Released from escrow");
        Ok(())
    }
}
