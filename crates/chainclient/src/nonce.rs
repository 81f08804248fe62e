//! Local nonce assignment for concurrent senders.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::Address;

use crate::client::EthClient;
use crate::error::ClientError;
use crate::types::BlockNumber;

/// Hands out consecutive nonces for one account without a round trip per
/// transaction.
///
/// Seeded once from `eth_getTransactionCount(address, "pending")`. Only
/// correct while this process is the sole sender for the account: a
/// transaction sent from anywhere else makes the local value stale, and a
/// submission that fails after `next()` leaves a gap. Call
/// [`resync`](Self::resync) after either.
#[derive(Debug)]
pub struct NonceCounter {
    address: Address,
    next: AtomicU64,
}

impl NonceCounter {
    pub fn new(address: Address, start: u64) -> Self {
        Self {
            address,
            next: AtomicU64::new(start),
        }
    }

    pub async fn seed(client: &EthClient, address: Address) -> Result<Self, ClientError> {
        let start = client
            .transaction_count(address, BlockNumber::Pending)
            .await?;
        tracing::debug!(%address, start, "nonce counter seeded");
        Ok(Self::new(address, start))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Reserve the next nonce.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The nonce the next call to [`next`](Self::next) returns.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    pub async fn resync(&self, client: &EthClient) -> Result<u64, ClientError> {
        let current = client
            .transaction_count(self.address, BlockNumber::Pending)
            .await?;
        self.next.store(current, Ordering::SeqCst);
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_nonces_are_unique() {
        let counter = Arc::new(NonceCounter::new(Address::ZERO, 10));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                (0..25).map(|_| counter.next()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for nonce in handle.await.unwrap() {
                assert!(seen.insert(nonce), "nonce {nonce} handed out twice");
            }
        }
        assert_eq!(seen.len(), 200);
        assert_eq!(*seen.iter().min().unwrap(), 10);
        assert_eq!(counter.peek(), 210);
    }
}
