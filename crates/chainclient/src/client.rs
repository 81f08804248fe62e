//! The caller-facing Ethereum client.

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, TxKind, B256, U256, U64};
use alloy_signer_local::PrivateKeySigner;
use chainclient_abi::{parse_args, AbiEvent, ArgInput};
use chainclient_core::{
    ConnectionPool, Dispatcher, JsonRpcRequest, RequestIds, RpcTransport, TransportError,
};
use chainclient_http::{EndpointFactory, HttpRpcClient};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tokio_retry::strategy::FibonacciBackoff;
use tokio_retry::RetryIf;

use crate::compile::{self, REMOTE_COMPILE_METHOD};
use crate::config::{ClientConfig, ReceiptPolling};
use crate::error::ClientError;
use crate::tx::{SignedTx, UnsignedTx, DEPLOY_GAS_LIMIT, INVOKE_GAS_LIMIT, TRANSFER_GAS_LIMIT};
use crate::types::{
    Block, BlockNumber, CallRequest, CompileResult, DeployedContract, Deployment, InvokeOutcome,
    Receipt, Transaction, TransactionOptions,
};

/// Ethereum JSON-RPC client.
///
/// Every request goes through one [`RpcTransport`]. Built with
/// [`connect`](Self::connect) that transport is a [`Dispatcher`] over a
/// pool of HTTP connections; [`new`](Self::new) accepts any transport.
///
/// Read operations need no account. Anything that sends a transaction
/// needs a signer and fails with [`ClientError::NoSigner`] otherwise.
pub struct EthClient {
    transport: Arc<dyn RpcTransport>,
    dispatcher: Option<Arc<Dispatcher<HttpRpcClient>>>,
    ids: RequestIds,
    signer: Option<PrivateKeySigner>,
    chain_id: OnceCell<u64>,
    receipt: ReceiptPolling,
    solc: PathBuf,
}

impl EthClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            dispatcher: None,
            ids: RequestIds::default(),
            signer: None,
            chain_id: OnceCell::new(),
            receipt: ReceiptPolling::default(),
            solc: PathBuf::from("solc"),
        }
    }

    /// Build the endpoint factory, the pool and the dispatcher described by
    /// `config`, and load its account if one is configured.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let factory = EndpointFactory::new(config.endpoints.clone(), config.http_config())?;
        let pool: ConnectionPool<HttpRpcClient> =
            ConnectionPool::new(Arc::new(factory), config.pool_config()).await?;
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(pool), config.dispatch_config()));

        let mut client = Self::new(dispatcher.clone())
            .with_receipt_polling(config.receipt.clone())
            .with_solc(config.solc.clone());
        client.dispatcher = Some(dispatcher);

        if let Some(account) = &config.account {
            client = client.with_signer(account.signer()?);
        }
        if let Some(chain_id) = config.chain_id {
            client = client.with_chain_id(chain_id);
        }

        tracing::info!(
            endpoints = config.endpoints.len(),
            pool_size = config.pool_size,
            account = ?client.address(),
            "client connected"
        );
        Ok(client)
    }

    pub fn with_signer(mut self, signer: PrivateKeySigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Skip `eth_chainId` and sign for `chain_id`.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = OnceCell::new_with(Some(chain_id));
        self
    }

    pub fn with_receipt_polling(mut self, polling: ReceiptPolling) -> Self {
        self.receipt = polling;
        self
    }

    pub fn with_solc(mut self, solc: impl Into<PathBuf>) -> Self {
        self.solc = solc.into();
        self
    }

    /// Address of the configured account.
    pub fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    /// Close the connection pool, waiting for borrowed connections.
    /// A client built with [`new`](Self::new) owns no pool.
    pub async fn close(&self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.close().await;
        }
    }

    // ─── Raw calls ───────────────────────────────────────────────────────────

    /// Send `method` with `params` and return the raw `result`.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        let req = JsonRpcRequest::new(self.ids.next(), method, params);
        tracing::trace!(method, id = %req.id, "rpc request");
        let resp = self.transport.send(req).await?;
        resp.into_result()
            .map_err(|e| ClientError::Transport(TransportError::Rpc(e)))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ClientError> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    // ─── Chain queries ───────────────────────────────────────────────────────

    /// Chain id, fetched once and cached.
    pub async fn chain_id(&self) -> Result<u64, ClientError> {
        self.chain_id
            .get_or_try_init(|| async {
                let id: U64 = self.request("eth_chainId", vec![]).await?;
                Ok::<_, ClientError>(id.to::<u64>())
            })
            .await
            .copied()
    }

    pub async fn gas_price(&self) -> Result<U256, ClientError> {
        self.request("eth_gasPrice", vec![]).await
    }

    pub async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, ClientError> {
        let gas: U64 = self.request("eth_estimateGas", vec![json!(call)]).await?;
        Ok(gas.to::<u64>())
    }

    pub async fn balance(&self, address: Address, block: BlockNumber) -> Result<U256, ClientError> {
        self.request("eth_getBalance", vec![json!(address), json!(block)])
            .await
    }

    pub async fn transaction_count(
        &self,
        address: Address,
        block: BlockNumber,
    ) -> Result<u64, ClientError> {
        let count: U64 = self
            .request("eth_getTransactionCount", vec![json!(address), json!(block)])
            .await?;
        Ok(count.to::<u64>())
    }

    pub async fn code(&self, address: Address, block: BlockNumber) -> Result<Bytes, ClientError> {
        self.request("eth_getCode", vec![json!(address), json!(block)])
            .await
    }

    /// `None` when the node does not know the block.
    pub async fn block_by_number(
        &self,
        block: BlockNumber,
        full: bool,
    ) -> Result<Option<Block>, ClientError> {
        self.request("eth_getBlockByNumber", vec![json!(block), json!(full)])
            .await
    }

    pub async fn block_transaction_count_by_hash(
        &self,
        hash: B256,
    ) -> Result<Option<u64>, ClientError> {
        let count: Option<U64> = self
            .request("eth_getBlockTransactionCountByHash", vec![json!(hash)])
            .await?;
        Ok(count.map(|c| c.to::<u64>()))
    }

    pub async fn block_transaction_count_by_number(
        &self,
        block: BlockNumber,
    ) -> Result<Option<u64>, ClientError> {
        let count: Option<U64> = self
            .request("eth_getBlockTransactionCountByNumber", vec![json!(block)])
            .await?;
        Ok(count.map(|c| c.to::<u64>()))
    }

    pub async fn transaction_by_hash(&self, hash: B256) -> Result<Option<Transaction>, ClientError> {
        self.request("eth_getTransactionByHash", vec![json!(hash)])
            .await
    }

    pub async fn transaction_by_block_hash_and_index(
        &self,
        block: B256,
        index: u64,
    ) -> Result<Option<Transaction>, ClientError> {
        self.request(
            "eth_getTransactionByBlockHashAndIndex",
            vec![json!(block), json!(U64::from(index))],
        )
        .await
    }

    pub async fn transaction_by_block_number_and_index(
        &self,
        block: BlockNumber,
        index: u64,
    ) -> Result<Option<Transaction>, ClientError> {
        self.request(
            "eth_getTransactionByBlockNumberAndIndex",
            vec![json!(block), json!(U64::from(index))],
        )
        .await
    }

    /// One `eth_getTransactionReceipt` round trip; `None` while pending.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, ClientError> {
        self.request("eth_getTransactionReceipt", vec![json!(hash)])
            .await
    }

    /// Poll for the receipt of `hash` with Fibonacci backoff.
    ///
    /// Receipts appear some time after submission, so "not found" is
    /// retried until the polling budget is spent. The receipt is returned
    /// whatever its status.
    pub async fn wait_for_receipt(&self, hash: B256) -> Result<Receipt, ClientError> {
        let attempts = self.receipt.attempts.max(1);
        let strategy = FibonacciBackoff::from_millis(self.receipt.base_ms.max(1)).take(attempts - 1);

        RetryIf::spawn(
            strategy,
            move || async move {
                match self.transaction_receipt(hash).await {
                    Ok(Some(receipt)) => Ok(receipt),
                    Ok(None) => Err(ClientError::ReceiptTimeout { hash, attempts }),
                    Err(e) => Err(e),
                }
            },
            move |e: &ClientError| {
                tracing::debug!(%hash, error = %e, "receipt not available yet");
                e.is_transient()
            },
        )
        .await
    }

    /// [`wait_for_receipt`](Self::wait_for_receipt), failing with
    /// [`ClientError::Reverted`] when the transaction failed on chain.
    pub async fn confirmed_receipt(&self, hash: B256) -> Result<Receipt, ClientError> {
        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.succeeded() {
            tracing::warn!(%hash, "transaction failed on chain");
            return Err(ClientError::Reverted { hash });
        }
        Ok(receipt)
    }

    pub async fn eth_call(&self, call: &CallRequest, block: BlockNumber) -> Result<Bytes, ClientError> {
        self.request("eth_call", vec![json!(call), json!(block)]).await
    }

    // ─── Transactions ────────────────────────────────────────────────────────

    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, ClientError> {
        let hash: B256 = self
            .request("eth_sendRawTransaction", vec![json!(raw)])
            .await?;
        tracing::info!(%hash, "transaction submitted");
        Ok(hash)
    }

    pub async fn send_raw_transaction_with_receipt(&self, raw: Bytes) -> Result<Receipt, ClientError> {
        let hash = self.send_raw_transaction(raw).await?;
        self.confirmed_receipt(hash).await
    }

    /// Transfer `opts.value` wei to `to`. Gas limit defaults to 21 000.
    pub async fn send_transaction(
        &self,
        to: Address,
        opts: TransactionOptions,
    ) -> Result<B256, ClientError> {
        let signed = self
            .sign(TxKind::Call(to), Bytes::new(), &opts, TRANSFER_GAS_LIMIT)
            .await?;
        self.send_raw_transaction(signed.raw).await
    }

    pub async fn send_transaction_with_receipt(
        &self,
        to: Address,
        opts: TransactionOptions,
    ) -> Result<Receipt, ClientError> {
        let hash = self.send_transaction(to, opts).await?;
        self.confirmed_receipt(hash).await
    }

    /// Resolve nonce, gas price and chain id, then sign with the account.
    pub async fn sign(
        &self,
        to: TxKind,
        input: Bytes,
        opts: &TransactionOptions,
        default_gas: u64,
    ) -> Result<SignedTx, ClientError> {
        let signer = self.signer.as_ref().ok_or(ClientError::NoSigner)?;
        let nonce = match opts.nonce {
            Some(nonce) => nonce,
            None => {
                self.transaction_count(signer.address(), BlockNumber::Pending)
                    .await?
            }
        };
        let gas_price = match opts.gas_price {
            Some(price) => price,
            None => self.gas_price().await?,
        };
        let chain_id = self.chain_id().await?;

        UnsignedTx {
            chain_id,
            nonce,
            gas_price,
            gas_limit: opts.gas_limit.unwrap_or(default_gas),
            to,
            value: opts.value,
            input,
        }
        .sign(signer)
    }

    // ─── Contracts ───────────────────────────────────────────────────────────

    /// Call `method` on the contract at `address`.
    ///
    /// `view`/`pure` methods go through `eth_call` and return the decoded
    /// outputs. Everything else is signed and submitted (gas limit
    /// defaults to 1 000 000) and the transaction hash is returned without
    /// waiting for the receipt.
    pub async fn invoke(
        &self,
        abi: &AbiEvent,
        address: Address,
        method: &str,
        args: &[ArgInput],
        opts: TransactionOptions,
    ) -> Result<InvokeOutcome, ClientError> {
        let values = abi.typed_args(method, args)?;
        let data = abi.encode_call(method, values)?;

        if !abi.is_read_only(method)? {
            let signed = self
                .sign(TxKind::Call(address), data.into(), &opts, INVOKE_GAS_LIMIT)
                .await?;
            tracing::debug!(%address, method, nonce = signed.nonce, "invoking");
            return Ok(InvokeOutcome::Submitted(self.send_raw_transaction(signed.raw).await?));
        }

        let mut call = CallRequest::to(address, data);
        if let Some(from) = self.address() {
            call = call.with_from(from);
        }
        let output = self.eth_call(&call, BlockNumber::Latest).await?;
        if output.is_empty() {
            let code = self.code(address, BlockNumber::Latest).await?;
            if code.is_empty() {
                return Err(ClientError::NoCode { address });
            }
            if abi.function(method)?.outputs.is_empty() {
                return Ok(InvokeOutcome::Returned(Vec::new()));
            }
            return Err(ClientError::EmptyOutput {
                address,
                method: method.to_string(),
            });
        }
        Ok(InvokeOutcome::Returned(abi.unpack_output(method, &output)?))
    }

    /// Like [`invoke`](Self::invoke) with a `^`-separated argument line.
    pub async fn invoke_str(
        &self,
        abi: &AbiEvent,
        address: Address,
        method: &str,
        args: &str,
        opts: TransactionOptions,
    ) -> Result<InvokeOutcome, ClientError> {
        self.invoke(abi, address, method, &parse_args(args), opts)
            .await
    }

    /// Compile with the local `solc` or with the node's compiler.
    /// `sources` is a comma-separated list of files (local) or the source
    /// text (remote).
    pub async fn compile(&self, sources: &str, local: bool) -> Result<CompileResult, ClientError> {
        if local {
            return compile::compile_local(&self.solc, sources).await;
        }
        self.request(REMOTE_COMPILE_METHOD, vec![json!(sources)])
            .await
    }

    /// Compile `sources` and deploy every artifact that has bytecode, in
    /// compiler order, with the same constructor arguments.
    ///
    /// The first failure aborts the run; contracts deployed before it stay
    /// on chain but are not reported.
    pub async fn deploy(
        &self,
        sources: &str,
        args: &str,
        local: bool,
        opts: TransactionOptions,
    ) -> Result<Deployment, ClientError> {
        let compiled = self.compile(sources, local).await?;
        if compiled.is_empty() {
            return Err(ClientError::EmptyContract);
        }

        let inputs = parse_args(args);
        let mut opts = opts;
        let mut contracts = Vec::new();
        for (name, abi, bin) in compiled.artifacts() {
            if bin.trim().trim_start_matches("0x").is_empty() {
                tracing::debug!(name, "no bytecode, skipped");
                continue;
            }
            let abi = AbiEvent::from_json(abi)?;
            let deployed = self.deploy_by_code(&abi, bin, &inputs, opts.clone()).await?;
            if let Some(nonce) = opts.nonce.as_mut() {
                *nonce += 1;
            }
            contracts.push(DeployedContract {
                name: Some(name.to_string()),
                ..deployed
            });
        }
        Ok(Deployment { compiled, contracts })
    }

    /// Deploy hex `bytecode` with constructor `args` and wait for the
    /// receipt. Gas limit defaults to 10 000 000.
    pub async fn deploy_by_code(
        &self,
        abi: &AbiEvent,
        bytecode: &str,
        args: &[ArgInput],
        opts: TransactionOptions,
    ) -> Result<DeployedContract, ClientError> {
        let code = hex::decode(bytecode.trim().trim_start_matches("0x"))
            .map_err(|e| ClientError::Compile(format!("invalid bytecode: {e}")))?;
        if code.is_empty() {
            return Err(ClientError::EmptyContract);
        }
        let values = abi.typed_args("", args)?;
        let data = abi.encode_deploy(&code, values)?;

        let signed = self
            .sign(TxKind::Create, data.into(), &opts, DEPLOY_GAS_LIMIT)
            .await?;
        let nonce = signed.nonce;
        let hash = self.send_raw_transaction(signed.raw).await?;
        let receipt = self.confirmed_receipt(hash).await?;

        let address = match receipt.contract_address {
            Some(address) => address,
            None => self.address().ok_or(ClientError::NoSigner)?.create(nonce),
        };
        tracing::info!(%address, %hash, "contract deployed");
        Ok(DeployedContract {
            name: None,
            address,
            transaction_hash: hash,
            block_number: receipt.block(),
        })
    }
}

impl std::fmt::Debug for EthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthClient")
            .field("transport", &self.transport.url())
            .field("account", &self.address())
            .field("chain_id", &self.chain_id.get())
            .finish()
    }
}
