//! tests/decoder_tests.rs - Message payload decoding and account classification

#[cfg(test)]
mod tests {
    use crate::blockchain::client::ChainClient;
    use crate::catalog::ContractCatalog;
    use crate::decoder::{AccountParser, MessageParser, ParseError};
    use crate::models::{
        AccountState, ContractInterface, ContractOperation, GetMethodDesc, MessageType, Schema,
        StackValueDesc, VmValue,
    };
    use crate::tests::fixtures::{address, block_id, message, setup, state, FakeChain, BROKEN};
    use serde_json::json;
    use std::sync::Arc;

    const TRANSFER: u32 = 0x5fcc3d14;

    async fn setup_catalog() -> Arc<ContractCatalog> {
        let (_pool, catalog) = setup().await;

        catalog
            .add_interface(ContractInterface {
                name: "nft_item".to_string(),
                addresses: vec![address(2)],
                ..Default::default()
            })
            .await
            .unwrap();
        catalog
            .add_interface(ContractInterface {
                name: "wallet".to_string(),
                addresses: vec![address(1)],
                ..Default::default()
            })
            .await
            .unwrap();

        catalog
            .add_operation(ContractOperation {
                operation_name: "nft_item_transfer".to_string(),
                contract_name: "nft_item".to_string(),
                message_type: MessageType::Internal,
                outgoing: false,
                operation_id: TRANSFER,
                schema: Schema(json!("nft_transfer")),
            })
            .await
            .unwrap();
        catalog
            .add_operation(ContractOperation {
                operation_name: "wallet_send".to_string(),
                contract_name: "wallet".to_string(),
                message_type: MessageType::Internal,
                outgoing: true,
                operation_id: 0x1234,
                schema: Schema(json!("wallet_send")),
            })
            .await
            .unwrap();

        catalog
    }

    fn typed(address_byte: u8, types: &[&str]) -> AccountState {
        AccountState {
            types: types.iter().map(|t| t.to_string()).collect(),
            ..state(address(address_byte), 10, block_id(1))
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_benign() {
        let parser = MessageParser::new(setup_catalog().await);
        let mut msg = message(1, Some(address(1)), Some(address(2)), 5);

        let err = parser
            .parse_message_payload(None, Some(&typed(2, &["nft_item"])), &mut msg)
            .await
            .unwrap_err();

        assert!(matches!(err, ParseError::Impossible(_)));
        assert!(err.is_benign());
        assert!(msg.operation_name.is_none());
    }

    #[tokio::test]
    async fn test_incoming_operation_is_decoded() {
        let parser = MessageParser::new(setup_catalog().await);
        let mut msg = message(1, Some(address(1)), Some(address(2)), 5);
        msg.operation_id = TRANSFER;
        msg.body = vec![0x5f, 0xcc, 0x3d, 0x14];

        parser
            .parse_message_payload(Some(&typed(1, &[])), Some(&typed(2, &["nft_item"])), &mut msg)
            .await
            .unwrap();

        assert_eq!(msg.operation_name.as_deref(), Some("nft_item_transfer"));
        assert_eq!(msg.dst_contract.as_deref(), Some("nft_item"));
        assert_eq!(msg.data_json, Some(json!({"schema": "nft_transfer", "body": "5fcc3d14"})));
    }

    #[tokio::test]
    async fn test_outgoing_is_tried_after_incoming() {
        let parser = MessageParser::new(setup_catalog().await);
        let mut msg = message(1, Some(address(1)), Some(address(3)), 5);
        msg.operation_id = 0x1234;
        msg.body = vec![0x00, 0x00, 0x12, 0x34];

        // The destination is unknown, so the source decodes it
        parser
            .parse_message_payload(Some(&typed(1, &["wallet"])), None, &mut msg)
            .await
            .unwrap();

        assert_eq!(msg.operation_name.as_deref(), Some("wallet_send"));
        assert_eq!(msg.src_contract.as_deref(), Some("wallet"));
        assert!(msg.dst_contract.is_none());
    }

    #[tokio::test]
    async fn test_unknown_operation_is_benign() {
        let parser = MessageParser::new(setup_catalog().await);
        let mut msg = message(1, Some(address(1)), Some(address(2)), 5);
        msg.operation_id = 0xdead;
        msg.body = vec![0x01];

        let err = parser
            .parse_message_payload(Some(&typed(1, &["wallet"])), Some(&typed(2, &["nft_item"])), &mut msg)
            .await
            .unwrap_err();

        assert!(err.is_benign());
    }

    #[tokio::test]
    async fn test_schema_failure_is_reported() {
        let parser = MessageParser::new(setup_catalog().await);
        let mut msg = message(1, Some(address(1)), Some(address(2)), 5);
        msg.operation_id = TRANSFER;
        msg.body = vec![BROKEN, 0x00];

        let err = parser
            .parse_message_payload(None, Some(&typed(2, &["nft_item"])), &mut msg)
            .await
            .unwrap_err();

        assert!(matches!(err, ParseError::Decode { .. }));
        assert!(!err.is_benign());
        assert!(msg.data_json.is_none());
    }

    #[tokio::test]
    async fn test_account_parser_runs_get_methods() {
        let (_pool, catalog) = setup().await;
        catalog
            .add_interface(ContractInterface {
                name: "nft_item".to_string(),
                addresses: vec![address(2)],
                get_methods: vec![
                    GetMethodDesc {
                        name: "get_nft_data".to_string(),
                        arguments: vec![],
                        return_values: vec![
                            StackValueDesc {
                                name: "init".to_string(),
                                stack_type: "int".to_string(),
                                format: None,
                            },
                            StackValueDesc {
                                name: "owner_address".to_string(),
                                stack_type: "slice".to_string(),
                                format: Some(Schema(json!("utf8"))),
                            },
                        ],
                    },
                    GetMethodDesc {
                        name: "royalty_params".to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            })
            .await
            .unwrap();

        let owner = address(9);
        let chain = Arc::new(FakeChain::default());
        chain.add_get_method(
            address(2),
            "get_nft_data",
            vec![
                VmValue::Int("-1".to_string()),
                VmValue::Slice(owner.to_string().into_bytes()),
            ],
        );
        let client: Arc<dyn ChainClient> = chain;
        let parser = AccountParser::new(catalog, client);

        let mut account = state(address(2), 10, block_id(1));
        parser.parse_account(&mut account).await.unwrap();

        assert_eq!(account.types, vec!["nft_item".to_string()]);
        assert_eq!(account.owner_address, Some(owner));

        let executions = &account.executed_get_methods["nft_item"];
        assert_eq!(executions.len(), 2);
        let nft_data = executions.iter().find(|e| e.name == "get_nft_data").unwrap();
        assert_eq!(nft_data.returns[0], json!("-1"));
        // A failing get-method is recorded, not raised
        let royalty = executions.iter().find(|e| e.name == "royalty_params").unwrap();
        assert!(royalty.error.is_some());
    }

    #[tokio::test]
    async fn test_unmatched_account_has_no_parsed_data() {
        let (_pool, catalog) = setup().await;
        let client: Arc<dyn ChainClient> = Arc::new(FakeChain::default());
        let parser = AccountParser::new(catalog, client);

        let mut account = typed(4, &["stale"]);
        parser.parse_account(&mut account).await.unwrap();

        assert!(account.types.is_empty());
        assert!(account.executed_get_methods.is_empty());
    }
}
