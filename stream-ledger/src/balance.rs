//! Per-token aggregation of incoming accrual
//!
//! Tokens are reported in the order they first appear in the walked
//! sequence, never sorted.

use crate::{
    accrual,
    error::{Error, Result},
    types::{Address, Stream, Timestamp, TokenBalance},
};
use std::collections::HashMap;

/// Sum vested amounts per token at a single instant `now`
pub fn aggregate<'a, I>(streams: I, now: Timestamp) -> Result<Vec<TokenBalance>>
where
    I: IntoIterator<Item = &'a Stream>,
{
    let mut balances: Vec<TokenBalance> = Vec::new();
    let mut positions: HashMap<&Address, usize> = HashMap::new();

    for stream in streams {
        let vested = accrual::vested(stream, now);
        let slot = *positions.entry(&stream.token).or_insert_with(|| {
            balances.push(TokenBalance {
                token: stream.token.clone(),
                incoming_balance: 0,
            });
            balances.len() - 1
        });

        let entry = &mut balances[slot];
        entry.incoming_balance = entry
            .incoming_balance
            .checked_add(vested)
            .ok_or_else(|| Error::AmountOverflow(format!("incoming balance of {}", stream.token)))?;
    }

    Ok(balances)
}
