//! Typed JSON-RPC methods on top of the generic gateway call.
//!
//! Every method funnels through [`UniProvider::request`], so instrumentation
//! and metric names are shared and only the method label differs.

use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::primitives::{Address, Bytes, TxHash, U256, U64};
use alloy::rpc::types::{Block, Filter, Log, TransactionReceipt, TransactionRequest};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::load_balancer::gateway::UniProvider;

impl UniProvider {
    /// Generic call with the result decoded into `R`.
    pub async fn request_typed<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> GatewayResult<R> {
        let value = self.request(method, params, session_id).await?;
        serde_json::from_value(value).map_err(|source| GatewayError::Decode {
            method: method.to_string(),
            source,
        })
    }

    pub async fn block_number(&self, session_id: Option<&str>) -> GatewayResult<u64> {
        let number: U64 = self.request_typed("eth_blockNumber", json!([]), session_id).await?;
        Ok(number.to::<u64>())
    }

    /// Chain id reported by the upstream (not the configured one).
    pub async fn get_chain_id(&self, session_id: Option<&str>) -> GatewayResult<u64> {
        let id: U64 = self.request_typed("eth_chainId", json!([]), session_id).await?;
        Ok(id.to::<u64>())
    }

    pub async fn gas_price(&self, session_id: Option<&str>) -> GatewayResult<U256> {
        self.request_typed("eth_gasPrice", json!([]), session_id).await
    }

    pub async fn get_balance(
        &self,
        address: Address,
        block: BlockId,
        session_id: Option<&str>,
    ) -> GatewayResult<U256> {
        self.request_typed("eth_getBalance", json!([address, block]), session_id)
            .await
    }

    pub async fn call(
        &self,
        tx: &TransactionRequest,
        block: BlockId,
        session_id: Option<&str>,
    ) -> GatewayResult<Bytes> {
        self.request_typed("eth_call", json!([tx, block]), session_id).await
    }

    pub async fn get_block_by_number(
        &self,
        number: BlockNumberOrTag,
        full_transactions: bool,
        session_id: Option<&str>,
    ) -> GatewayResult<Option<Block>> {
        self.request_typed(
            "eth_getBlockByNumber",
            json!([number, full_transactions]),
            session_id,
        )
        .await
    }

    pub async fn get_transaction_receipt(
        &self,
        hash: TxHash,
        session_id: Option<&str>,
    ) -> GatewayResult<Option<TransactionReceipt>> {
        self.request_typed("eth_getTransactionReceipt", json!([hash]), session_id)
            .await
    }

    pub async fn get_logs(&self, filter: &Filter, session_id: Option<&str>) -> GatewayResult<Vec<Log>> {
        self.request_typed("eth_getLogs", json!([filter]), session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::transport::RpcTransport;
    use crate::blockchain::types::{ChainId, TransportError};
    use crate::config::{EndpointConfig, UniProviderConfig};
    use crate::load_balancer::endpoint::SingleEndpointProvider;
    use crate::load_balancer::gateway::GatewaySettings;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use url::Url;

    /// Answers every method with a fixed value and remembers the last request.
    #[derive(Debug)]
    struct FixedTransport {
        response: Value,
        last: Mutex<Option<(String, Value)>>,
    }

    #[async_trait]
    impl RpcTransport for FixedTransport {
        async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
            *self.last.lock() = Some((method.to_string(), params));
            Ok(self.response.clone())
        }
    }

    fn gateway(response: Value) -> (UniProvider, Arc<FixedTransport>) {
        let transport = Arc::new(FixedTransport {
            response,
            last: Mutex::new(None),
        });
        let url = Url::parse("https://mainnet.infura.io/v3/key").unwrap();
        let endpoint = Arc::new(SingleEndpointProvider::new(
            ChainId(1),
            &url,
            transport.clone(),
            EndpointConfig::default(),
            None,
        ));
        let settings = GatewaySettings {
            uni: UniProviderConfig {
                enable_shadow_latency_evaluation: false,
                ..UniProviderConfig::default()
            },
            ..GatewaySettings::default()
        };
        (UniProvider::new(ChainId(1), vec![endpoint], settings).unwrap(), transport)
    }

    #[tokio::test]
    async fn test_block_number_decodes_hex() {
        let (gateway, transport) = gateway(json!("0x10"));
        assert_eq!(gateway.block_number(None).await.unwrap(), 16);
        assert_eq!(
            transport.last.lock().clone(),
            Some(("eth_blockNumber".to_string(), json!([])))
        );
    }

    #[tokio::test]
    async fn test_get_balance_sends_address_and_block() {
        let (gateway, transport) = gateway(json!("0xde0b6b3a7640000"));
        let balance = gateway
            .get_balance(Address::ZERO, BlockId::latest(), None)
            .await
            .unwrap();
        assert_eq!(balance, U256::from(1_000_000_000_000_000_000u64));

        let (method, params) = transport.last.lock().clone().unwrap();
        assert_eq!(method, "eth_getBalance");
        assert_eq!(params, json!(["0x0000000000000000000000000000000000000000", "latest"]));
    }

    #[tokio::test]
    async fn test_missing_receipt_is_none() {
        let (gateway, _) = gateway(Value::Null);
        let receipt = gateway.get_transaction_receipt(TxHash::ZERO, None).await.unwrap();
        assert!(receipt.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_decode_error() {
        let (gateway, _) = gateway(json!({"not": "a number"}));
        let err = gateway.block_number(None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode { ref method, .. } if method == "eth_blockNumber"));
    }
}
