//! Read-only commands: `call`, `gas-price`, `balance`, `block`.

use anyhow::{anyhow, Context, Result};
use chainclient::{BlockNumber, EthClient};
use serde_json::Value;

pub async fn call(client: &EthClient, method: &str, params: &str) -> Result<()> {
    let params: Vec<Value> =
        serde_json::from_str(params).context("--params must be a JSON array")?;
    let result = client.call(method, params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn gas_price(client: &EthClient) -> Result<()> {
    println!("{}", client.gas_price().await?);
    Ok(())
}

pub async fn balance(client: &EthClient, address: &str, block: &str) -> Result<()> {
    let address = address
        .parse()
        .with_context(|| format!("invalid address {address}"))?;
    let block: BlockNumber = block.parse().map_err(|e: String| anyhow!(e))?;
    println!("{}", client.balance(address, block).await?);
    Ok(())
}

pub async fn block(client: &EthClient, number: Option<u64>, full: bool) -> Result<()> {
    let selector = number.map_or(BlockNumber::Latest, BlockNumber::Number);
    match client.block_by_number(selector, full).await? {
        Some(block) => println!("{}", serde_json::to_string_pretty(&block)?),
        None => println!("block {selector} not found"),
    }
    Ok(())
}
