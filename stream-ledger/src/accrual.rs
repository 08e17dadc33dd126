//! Linear vesting math
//!
//! Pure functions of `(stream, now)`. Every quantity is an integer and
//! `deposit_total` is itself `rate_per_second * duration`, so the clamped and
//! linear branches agree exactly at `now == end_time`.
//!
//! # Invariant
//!
//! `vested(s, t) + remaining(s, t) == s.deposit_total` for every `t`.

use crate::types::{Amount, Stream, Timestamp};

/// Vested and unvested halves of a deposit at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    /// Owed to the receiver
    pub vested: Amount,
    /// Refundable to the sender
    pub remaining: Amount,
}

/// Seconds of the window that have elapsed, clamped to `[0, duration]`
pub fn elapsed(stream: &Stream, now: Timestamp) -> u64 {
    if now <= stream.start_time {
        0
    } else if now >= stream.end_time {
        stream.duration()
    } else {
        now.abs_diff(stream.start_time)
    }
}

/// Amount released to the receiver by `now`
pub fn vested(stream: &Stream, now: Timestamp) -> Amount {
    if now <= stream.start_time {
        return 0;
    }
    if now >= stream.end_time {
        return stream.deposit_total;
    }

    // elapsed < duration here, so the product is below deposit_total
    stream.rate_per_second * Amount::from(elapsed(stream, now))
}

/// Amount still refundable to the sender at `now`
pub fn remaining(stream: &Stream, now: Timestamp) -> Amount {
    stream.deposit_total - vested(stream, now)
}

/// Both halves from a single `now`
pub fn split(stream: &Stream, now: Timestamp) -> Split {
    let vested = vested(stream, now);
    Split {
        vested,
        remaining: stream.deposit_total - vested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, StreamStatus};

    fn stream(rate: Amount, start_time: Timestamp, end_time: Timestamp) -> Stream {
        Stream {
            id: 100_000,
            sender: Address::new("0xa11ce"),
            receiver: Address::new("0xb0b"),
            token: Address::new("0xusdc"),
            rate_per_second: rate,
            start_time,
            end_time,
            deposit_total: rate * (end_time - start_time) as Amount,
            status: StreamStatus::Active,
        }
    }

    #[test]
    fn test_before_start_nothing_vested() {
        let s = stream(100, 1_000, 1_010);
        assert_eq!(vested(&s, 0), 0);
        assert_eq!(vested(&s, 1_000), 0);
        assert_eq!(remaining(&s, 1_000), 1_000);
        assert_eq!(elapsed(&s, 999), 0);
    }

    #[test]
    fn test_linear_within_window() {
        let s = stream(100, 1_000, 1_010);
        assert_eq!(vested(&s, 1_001), 100);
        assert_eq!(vested(&s, 1_004), 400);
        assert_eq!(remaining(&s, 1_004), 600);
        assert_eq!(elapsed(&s, 1_004), 4);
    }

    #[test]
    fn test_after_end_fully_vested() {
        let s = stream(100, 1_000, 1_010);
        assert_eq!(vested(&s, 1_010), 1_000);
        assert_eq!(vested(&s, i64::MAX), 1_000);
        assert_eq!(remaining(&s, 2_000), 0);
        assert_eq!(elapsed(&s, 5_000), 10);
    }

    #[test]
    fn test_branches_agree_at_end() {
        let s = stream(7, -50, 50);
        let linear = s.rate_per_second * (s.end_time - s.start_time) as Amount;
        assert_eq!(vested(&s, s.end_time), linear);
        assert_eq!(vested(&s, s.end_time - 1), linear - 7);
    }

    #[test]
    fn test_split_conserves_deposit() {
        let s = stream(3, 10, 40);
        for now in 0..50 {
            let parts = split(&s, now);
            assert_eq!(parts.vested + parts.remaining, s.deposit_total);
            assert_eq!(parts.vested, vested(&s, now));
        }
    }
}
