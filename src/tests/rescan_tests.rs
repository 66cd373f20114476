//! tests/rescan_tests.rs - Checkpointed reconciliation of stored rows after catalog edits

#[cfg(test)]
mod tests {
    use crate::blockchain::client::ChainClient;
    use crate::catalog::ContractCatalog;
    use crate::config::Config;
    use crate::db;
    use crate::decoder::{AccountParser, MessageParser};
    use crate::models::{
        AccountState, AccountStateId, ContractInterface, ContractOperation, GetMethodDesc, MessageType,
        Schema, StackValueDesc, VmValue,
    };
    use crate::rescan::RescanEngine;
    use crate::decoder::CellCodec;
    use crate::tests::fixtures::{address, block_id, message, setup, state, test_config, FakeChain, FakeCodec};
    use serde_json::json;
    use sqlx::SqlitePool;
    use std::sync::Arc;

    const TRANSFER: u32 = 0x5fcc3d14;

    fn engine(pool: &SqlitePool, catalog: &Arc<ContractCatalog>, chain: Arc<FakeChain>, config: &Config) -> RescanEngine {
        let client: Arc<dyn ChainClient> = chain;
        RescanEngine::new(
            pool.clone(),
            catalog.clone(),
            AccountParser::new(catalog.clone(), client),
            MessageParser::new(catalog.clone()),
            config,
        )
    }

    async fn store_states(pool: &SqlitePool, states: &[AccountState]) {
        let mut tx = pool.begin().await.unwrap();
        db::account::add_account_states(&mut tx, states).await.unwrap();
        tx.commit().await.unwrap();
    }

    async fn load_state(pool: &SqlitePool, b: u8, lt: u64) -> AccountState {
        let id = AccountStateId {
            address: address(b),
            last_tx_lt: lt,
        };
        db::account::get_account_states(pool, &[id]).await.unwrap().remove(0)
    }

    async fn drain(engine: &RescanEngine) -> usize {
        let mut current = None;
        let mut pages = 0;
        while engine.process_next(&mut current).await.unwrap() {
            pages += 1;
        }
        pages
    }

    fn interface(name: &str, addresses: &[u8]) -> ContractInterface {
        ContractInterface {
            name: name.to_string(),
            addresses: addresses.iter().map(|b| address(*b)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resume_strictly_after_checkpoint() {
        let (pool, catalog) = setup().await;
        store_states(
            &pool,
            &[
                state(address(1), 50, block_id(1)),
                state(address(1), 100, block_id(2)),
                state(address(1), 150, block_id(3)),
                state(address(2), 10, block_id(1)),
            ],
        )
        .await;
        catalog.add_interface(interface("wallet", &[1, 2])).await.unwrap();

        // Simulate a restart after the page ending at (1, 100) was committed
        let mut task = db::rescan::get_unfinished_task(&pool).await.unwrap().unwrap();
        task.last_address = Some(address(1));
        task.last_tx_lt = 100;
        let mut tx = pool.begin().await.unwrap();
        db::rescan::set_task(&mut tx, &task).await.unwrap();
        tx.commit().await.unwrap();

        let engine = engine(&pool, &catalog, Arc::new(FakeChain::default()), &test_config());
        assert_eq!(drain(&engine).await, 1);

        assert!(load_state(&pool, 1, 50).await.types.is_empty());
        assert!(load_state(&pool, 1, 100).await.types.is_empty());
        assert_eq!(load_state(&pool, 1, 150).await.types, vec!["wallet".to_string()]);
        assert_eq!(load_state(&pool, 2, 10).await.types, vec!["wallet".to_string()]);

        let tasks = db::rescan::get_tasks(&pool).await.unwrap();
        assert!(tasks[0].finished);
        assert_eq!(tasks[0].checkpoint(), Some((address(2), 10)));
    }

    #[tokio::test]
    async fn test_pages_advance_checkpoint() {
        let (pool, catalog) = setup().await;
        store_states(
            &pool,
            &[
                state(address(1), 10, block_id(1)),
                state(address(2), 10, block_id(1)),
                state(address(3), 10, block_id(1)),
            ],
        )
        .await;
        catalog.add_interface(interface("wallet", &[1, 2, 3])).await.unwrap();

        let config = Config {
            rescan_select_limit: 2,
            ..test_config()
        };
        let engine = engine(&pool, &catalog, Arc::new(FakeChain::default()), &config);
        let mut current = None;

        assert!(engine.process_next(&mut current).await.unwrap());
        let task = db::rescan::get_unfinished_task(&pool).await.unwrap().unwrap();
        assert_eq!(task.checkpoint(), Some((address(2), 10)));
        assert!(load_state(&pool, 2, 10).await.has_interface("wallet"));
        assert!(!load_state(&pool, 3, 10).await.has_interface("wallet"));

        assert!(engine.process_next(&mut current).await.unwrap());
        assert!(db::rescan::get_unfinished_task(&pool).await.unwrap().is_none());
        assert!(load_state(&pool, 3, 10).await.has_interface("wallet"));

        assert!(!engine.process_next(&mut current).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleted_interface_is_removed_from_states() {
        let (pool, catalog) = setup().await;
        store_states(&pool, &[state(address(1), 10, block_id(1))]).await;
        let engine = engine(&pool, &catalog, Arc::new(FakeChain::default()), &test_config());

        catalog.add_interface(interface("wallet", &[1])).await.unwrap();
        drain(&engine).await;
        assert!(load_state(&pool, 1, 10).await.has_interface("wallet"));

        catalog.delete_interface("wallet").await.unwrap();
        drain(&engine).await;
        assert!(load_state(&pool, 1, 10).await.types.is_empty());
    }

    #[tokio::test]
    async fn test_new_get_method_fills_derived_fields() {
        let (pool, catalog) = setup().await;
        store_states(&pool, &[state(address(1), 10, block_id(1))]).await;

        let owner = address(9);
        let chain = Arc::new(FakeChain::default());
        chain.add_get_method(address(1), "get_owner", vec![VmValue::Slice(owner.to_string().into_bytes())]);
        let engine = engine(&pool, &catalog, chain, &test_config());

        catalog.add_interface(interface("nft_item", &[1])).await.unwrap();
        drain(&engine).await;
        assert!(load_state(&pool, 1, 10).await.owner_address.is_none());

        catalog
            .add_get_method(
                "nft_item",
                GetMethodDesc {
                    name: "get_owner".to_string(),
                    arguments: vec![],
                    return_values: vec![StackValueDesc {
                        name: "owner_address".to_string(),
                        stack_type: "slice".to_string(),
                        format: Some(Schema(json!("utf8"))),
                    }],
                },
            )
            .await
            .unwrap();
        drain(&engine).await;

        let stored = load_state(&pool, 1, 10).await;
        assert_eq!(stored.owner_address, Some(owner));
        assert_eq!(stored.executed_get_methods["nft_item"][0].name, "get_owner");

        catalog.delete_get_method("nft_item", "get_owner").await.unwrap();
        drain(&engine).await;

        let stored = load_state(&pool, 1, 10).await;
        assert!(stored.owner_address.is_none());
        assert!(stored.has_interface("nft_item"));
    }

    #[tokio::test]
    async fn test_operation_edits_redecode_messages() {
        let (pool, catalog) = setup().await;
        let engine = engine(&pool, &catalog, Arc::new(FakeChain::default()), &test_config());

        store_states(&pool, &[state(address(2), 20, block_id(1))]).await;
        catalog.add_interface(interface("nft_item", &[2])).await.unwrap();
        drain(&engine).await;

        let mut msg = message(7, Some(address(1)), Some(address(2)), 5);
        msg.operation_id = TRANSFER;
        msg.body = vec![0x5f, 0xcc, 0x3d, 0x14];
        msg.src.tx_lt = 10;
        msg.dst.tx_lt = 20;
        let mut tx = pool.begin().await.unwrap();
        db::message::add_messages(&mut tx, &[&msg]).await.unwrap();
        tx.commit().await.unwrap();

        let transfer = ContractOperation {
            operation_name: "nft_item_transfer".to_string(),
            contract_name: "nft_item".to_string(),
            message_type: MessageType::Internal,
            outgoing: false,
            operation_id: TRANSFER,
            schema: Schema(json!("nft_transfer")),
        };
        catalog.add_operation(transfer).await.unwrap();
        drain(&engine).await;

        let stored = db::message::get_messages(&pool, &[vec![7; 32]]).await.unwrap().remove(0);
        assert_eq!(stored.operation_name.as_deref(), Some("nft_item_transfer"));
        assert_eq!(stored.dst_contract.as_deref(), Some("nft_item"));
        assert!(stored.data_json.is_some());

        catalog.delete_operation("nft_item", "nft_item_transfer").await.unwrap();
        drain(&engine).await;

        let stored = db::message::get_messages(&pool, &[vec![7; 32]]).await.unwrap().remove(0);
        assert!(stored.operation_name.is_none());
        assert!(stored.dst_contract.is_none());
        assert!(stored.data_json.is_none());
    }

    #[tokio::test]
    async fn test_operation_pages_split_one_transaction() {
        let (pool, catalog) = setup().await;
        let config = Config {
            rescan_select_limit: 2,
            ..test_config()
        };
        let engine = engine(&pool, &catalog, Arc::new(FakeChain::default()), &config);

        store_states(&pool, &[state(address(1), 10, block_id(1))]).await;
        catalog.add_interface(interface("wallet", &[1])).await.unwrap();
        drain(&engine).await;

        // Three outgoing messages of the same transaction
        let messages: Vec<_> = (7..10)
            .map(|b| {
                let mut msg = message(b, Some(address(1)), Some(address(b)), 5);
                msg.operation_id = TRANSFER;
                msg.body = vec![0x5f, 0xcc, 0x3d, 0x14, b];
                msg.src.tx_lt = 10;
                msg
            })
            .collect();
        let mut tx = pool.begin().await.unwrap();
        db::message::add_messages(&mut tx, &messages.iter().collect::<Vec<_>>()).await.unwrap();
        tx.commit().await.unwrap();

        let transfer = ContractOperation {
            operation_name: "wallet_transfer".to_string(),
            contract_name: "wallet".to_string(),
            message_type: MessageType::Internal,
            outgoing: true,
            operation_id: TRANSFER,
            schema: Schema(json!("wallet_transfer")),
        };
        catalog.add_operation(transfer).await.unwrap();
        assert!(drain(&engine).await >= 2);

        let hashes: Vec<Vec<u8>> = (7..10).map(|b| vec![b; 32]).collect();
        let stored = db::message::get_messages(&pool, &hashes).await.unwrap();
        assert_eq!(stored.len(), 3);
        for msg in stored {
            assert_eq!(msg.operation_name.as_deref(), Some("wallet_transfer"));
            assert_eq!(msg.src_contract.as_deref(), Some("wallet"));
        }
    }

    #[tokio::test]
    async fn test_updated_interface_moves_between_states() {
        let (pool, catalog) = setup().await;
        store_states(
            &pool,
            &[state(address(1), 10, block_id(1)), state(address(2), 10, block_id(1))],
        )
        .await;
        let engine = engine(&pool, &catalog, Arc::new(FakeChain::default()), &test_config());

        catalog.add_interface(interface("wallet", &[1])).await.unwrap();
        drain(&engine).await;
        assert!(load_state(&pool, 1, 10).await.has_interface("wallet"));
        assert!(!load_state(&pool, 2, 10).await.has_interface("wallet"));

        catalog.update_interface(interface("wallet", &[2])).await.unwrap();
        drain(&engine).await;
        assert!(!load_state(&pool, 1, 10).await.has_interface("wallet"));
        assert!(load_state(&pool, 2, 10).await.has_interface("wallet"));
    }

    #[tokio::test]
    async fn test_updated_get_method_refreshes_result() {
        let (pool, catalog) = setup().await;
        store_states(&pool, &[state(address(1), 10, block_id(1))]).await;

        let chain = Arc::new(FakeChain::default());
        chain.add_get_method(address(1), "get_owner", vec![VmValue::Slice(address(8).to_string().into_bytes())]);
        let engine = engine(&pool, &catalog, chain.clone(), &test_config());

        let get_owner = GetMethodDesc {
            name: "get_owner".to_string(),
            arguments: vec![],
            return_values: vec![StackValueDesc {
                name: "owner_address".to_string(),
                stack_type: "slice".to_string(),
                format: Some(Schema(json!("utf8"))),
            }],
        };
        catalog
            .add_interface(ContractInterface {
                get_methods: vec![get_owner.clone()],
                ..interface("nft_item", &[1])
            })
            .await
            .unwrap();
        drain(&engine).await;
        assert_eq!(load_state(&pool, 1, 10).await.owner_address, Some(address(8)));

        chain.add_get_method(address(1), "get_owner", vec![VmValue::Slice(address(9).to_string().into_bytes())]);
        catalog.update_get_method("nft_item", get_owner).await.unwrap();
        drain(&engine).await;

        let stored = load_state(&pool, 1, 10).await;
        assert_eq!(stored.owner_address, Some(address(9)));
        assert!(stored.has_interface("nft_item"));
    }

    #[tokio::test]
    async fn test_interface_matched_by_get_methods() {
        let (pool, catalog) = setup().await;
        let codec = FakeCodec::default();
        let mut full = state(address(1), 10, block_id(1));
        full.get_method_hashes = vec![codec.method_id("get_wallet_data"), codec.method_id("seqno")];
        let mut partial = state(address(2), 10, block_id(1));
        partial.get_method_hashes = vec![codec.method_id("seqno")];
        store_states(&pool, &[full, partial]).await;

        let chain = Arc::new(FakeChain::default());
        chain.add_get_method(address(1), "get_wallet_data", vec![VmValue::Int("1".to_string())]);
        let engine = engine(&pool, &catalog, chain, &test_config());

        let jetton_wallet = ContractInterface {
            get_methods: vec![GetMethodDesc {
                name: "get_wallet_data".to_string(),
                arguments: vec![],
                return_values: vec![StackValueDesc {
                    name: "balance".to_string(),
                    stack_type: "int".to_string(),
                    format: None,
                }],
            }],
            ..interface("jetton_wallet", &[])
        };
        catalog.add_interface(jetton_wallet).await.unwrap();
        drain(&engine).await;

        assert_eq!(load_state(&pool, 1, 10).await.types, vec!["jetton_wallet".to_string()]);
        assert!(load_state(&pool, 2, 10).await.types.is_empty());
    }
}
