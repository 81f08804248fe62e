//! Contract commands: `invoke`, `deploy`, `batch-invoke`.

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use alloy_primitives::Address;
use chainclient_abi::{parse_args, AbiEvent};
use chainclient::compile::contract_name;
use chainclient::{EthClient, InvokeOutcome, NonceCounter, TransactionOptions};
use futures::future::join_all;

fn load(abi: &str, address: &str) -> Result<(AbiEvent, Address)> {
    let abi = AbiEvent::load(abi).with_context(|| format!("loading ABI {abi}"))?;
    let address = address
        .parse()
        .with_context(|| format!("invalid address {address}"))?;
    Ok((abi, address))
}

pub async fn invoke(
    client: &EthClient,
    abi: &str,
    address: &str,
    method: &str,
    args: &str,
    wait: bool,
) -> Result<()> {
    let (abi, address) = load(abi, address)?;
    let outcome = client
        .invoke_str(&abi, address, method, args, TransactionOptions::default())
        .await?;

    match outcome {
        InvokeOutcome::Submitted(hash) if wait => {
            let receipt = client.confirmed_receipt(hash).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        other => println!("{}", serde_json::to_string_pretty(&other.to_json())?),
    }
    Ok(())
}

pub async fn deploy(
    client: &EthClient,
    source: &str,
    args: &str,
    local: bool,
    abi_dir: Option<&str>,
) -> Result<()> {
    let deployment = client
        .deploy(source, args, local, TransactionOptions::default())
        .await?;

    for contract in &deployment.contracts {
        println!(
            "{}  {}  (tx {})",
            contract.name.as_deref().unwrap_or("-"),
            contract.address,
            contract.transaction_hash
        );
    }

    if let Some(dir) = abi_dir {
        std::fs::create_dir_all(dir)?;
        for (name, abi, _) in deployment.compiled.artifacts() {
            let path = Path::new(dir).join(format!("{}.abi", contract_name(name)));
            std::fs::write(&path, abi).with_context(|| format!("writing {}", path.display()))?;
        }
    }
    Ok(())
}

/// Nonces come from a local counter so the transactions do not collide.
pub async fn batch_invoke(
    client: &EthClient,
    abi: &str,
    address: &str,
    method: &str,
    args: &str,
    count: usize,
) -> Result<()> {
    let (abi, address) = load(abi, address)?;
    if abi.is_read_only(method)? {
        return Err(anyhow!("`{method}` is read-only; batch-invoke sends transactions"));
    }
    let sender = client
        .address()
        .ok_or_else(|| anyhow!("batch-invoke needs an account"))?;
    let nonces = NonceCounter::seed(client, sender).await?;
    let args = parse_args(args);

    let started = Instant::now();
    let sends = (0..count).map(|i| {
        let opts = TransactionOptions::default().with_nonce(nonces.next());
        let abi = &abi;
        let args = &args;
        async move {
            let result = client.invoke(abi, address, method, args, opts).await;
            (i, result)
        }
    });

    let mut sent = 0;
    for (i, result) in join_all(sends).await {
        match result {
            Ok(outcome) => {
                sent += 1;
                println!("tx {i}: {}", outcome.to_json());
            }
            Err(e) => eprintln!("tx {i}: {e}"),
        }
    }
    println!(
        "sent {sent}/{count} transactions in {}ms",
        started.elapsed().as_millis()
    );
    if sent < count {
        tracing::warn!(failed = count - sent, "some transactions failed; the nonce sequence has gaps");
    }
    Ok(())
}
