//! tests/catalog_tests.rs - Contract catalog edits, lookups and the rescan tasks they enqueue

#[cfg(test)]
mod tests {
    use crate::app::prepare_catalog;
    use crate::catalog::CatalogError;
    use crate::db;
    use crate::indexer::IndexerError;
    use crate::models::{
        ContractDefinition, ContractInterface, ContractOperation, GetMethodDesc, MessageType, RescanTaskType, Schema,
        StackValueDesc,
    };
    use crate::tests::fixtures::{address, setup, setup_with_codec, FakeCodec};
    use crate::decoder::CellCodec;
    use serde_json::json;

    fn wallet() -> ContractInterface {
        ContractInterface {
            name: "wallet".to_string(),
            code: Some(vec![0xb5, 0xee, 0x9c, 0x72]),
            get_methods: vec![GetMethodDesc {
                name: "seqno".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn transfer(operation_id: u32) -> ContractOperation {
        ContractOperation {
            operation_name: "transfer".to_string(),
            contract_name: "wallet".to_string(),
            message_type: MessageType::Internal,
            outgoing: false,
            operation_id,
            schema: Schema(json!({"op": "transfer"})),
        }
    }

    #[tokio::test]
    async fn test_add_interface_derives_hashes_and_enqueues_task() {
        let (pool, catalog) = setup().await;

        catalog.add_interface(wallet()).await.unwrap();

        let stored = catalog.get_interface("wallet").await.unwrap();
        assert_eq!(stored.code_hash, Some(FakeCodec::default().cell_hash(&[0xb5, 0xee, 0x9c, 0x72]).unwrap()));
        assert_eq!(stored.get_method_hashes, vec![FakeCodec::default().method_id("seqno")]);

        let tasks = db::rescan::get_tasks(&pool).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_type, RescanTaskType::AddInterface);
        assert_eq!(tasks[0].contract_name, "wallet");
        assert!(!tasks[0].finished);
    }

    #[tokio::test]
    async fn test_duplicate_interface_is_rejected() {
        let (pool, catalog) = setup().await;

        catalog.add_interface(wallet()).await.unwrap();
        let err = catalog.add_interface(wallet()).await.unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists));

        // The failed edit left no task behind
        assert_eq!(db::rescan::get_tasks(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_entries_are_not_found() {
        let (_pool, catalog) = setup().await;

        assert!(matches!(catalog.update_interface(wallet()).await, Err(CatalogError::NotFound)));
        assert!(matches!(catalog.delete_interface("wallet").await, Err(CatalogError::NotFound)));
        assert!(matches!(catalog.add_operation(transfer(1)).await, Err(CatalogError::NotFound)));
        assert!(matches!(
            catalog.delete_operation("wallet", "transfer").await,
            Err(CatalogError::NotFound)
        ));
        assert!(matches!(
            catalog.get_method_desc("wallet", "seqno").await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_reads_see_committed_edits() {
        let (_pool, catalog) = setup().await;

        // Warm the cache with the empty catalog
        assert!(catalog.get_interfaces().await.unwrap().is_empty());

        catalog.add_interface(wallet()).await.unwrap();
        assert_eq!(catalog.get_interfaces().await.unwrap().len(), 1);

        catalog
            .add_get_method(
                "wallet",
                GetMethodDesc {
                    name: "get_public_key".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let interface = catalog.get_interface("wallet").await.unwrap();
        assert_eq!(interface.get_methods.len(), 2);
        assert_eq!(interface.get_method_hashes.len(), 2);
        assert!(catalog.get_method_desc("wallet", "get_public_key").await.is_ok());

        catalog
            .update_get_method(
                "wallet",
                GetMethodDesc {
                    name: "seqno".to_string(),
                    return_values: vec![StackValueDesc {
                        name: "seqno".to_string(),
                        stack_type: "int".to_string(),
                        format: None,
                    }],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let seqno = catalog.get_method_desc("wallet", "seqno").await.unwrap();
        assert_eq!(seqno.return_values.len(), 1);
    }

    #[tokio::test]
    async fn test_operation_lookup_follows_interface_order() {
        let (_pool, catalog) = setup().await;

        catalog.add_interface(wallet()).await.unwrap();
        catalog
            .add_interface(ContractInterface {
                name: "jetton_wallet".to_string(),
                addresses: vec![address(7)],
                ..Default::default()
            })
            .await
            .unwrap();

        catalog.add_operation(transfer(0x0f8a7ea5)).await.unwrap();
        catalog
            .add_operation(ContractOperation {
                contract_name: "jetton_wallet".to_string(),
                operation_name: "jetton_transfer".to_string(),
                ..transfer(0x0f8a7ea5)
            })
            .await
            .unwrap();

        let types = vec!["jetton_wallet".to_string(), "wallet".to_string()];
        let op = catalog
            .get_operation_by_id(&types, MessageType::Internal, false, 0x0f8a7ea5)
            .await
            .unwrap();
        assert_eq!(op.operation_name, "jetton_transfer");

        // Direction is part of the key
        let err = catalog
            .get_operation_by_id(&types, MessageType::Internal, true, 0x0f8a7ea5)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }

    #[tokio::test]
    async fn test_operation_edits_enqueue_tasks() {
        let (pool, catalog) = setup().await;

        catalog.add_interface(wallet()).await.unwrap();
        catalog.add_operation(transfer(1)).await.unwrap();

        // Same name, new id: the old key gets cleared, the new one decoded
        catalog.update_operation(transfer(2)).await.unwrap();
        catalog.delete_operation("wallet", "transfer").await.unwrap();

        let tasks = db::rescan::get_tasks(&pool).await.unwrap();
        let kinds: Vec<_> = tasks
            .iter()
            .map(|t| (t.task_type, t.operation_id))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (RescanTaskType::AddInterface, None),
                (RescanTaskType::UpdOperation, Some(1)),
                (RescanTaskType::DelOperation, Some(1)),
                (RescanTaskType::UpdOperation, Some(2)),
                (RescanTaskType::DelOperation, Some(2)),
            ]
        );
        assert!(catalog.get_operations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_interface_removes_operations() {
        let (pool, catalog) = setup().await;

        catalog.add_interface(wallet()).await.unwrap();
        catalog.add_operation(transfer(1)).await.unwrap();
        catalog.delete_get_method("wallet", "seqno").await.unwrap();
        catalog.delete_interface("wallet").await.unwrap();

        assert!(catalog.get_interfaces().await.unwrap().is_empty());
        assert!(catalog.get_operations().await.unwrap().is_empty());

        let tasks = db::rescan::get_tasks(&pool).await.unwrap();
        let del_method = tasks
            .iter()
            .find(|t| t.task_type == RescanTaskType::DelGetMethod)
            .unwrap();
        assert_eq!(del_method.changed_get_methods, vec!["seqno".to_string()]);
        assert_eq!(tasks.last().unwrap().task_type, RescanTaskType::DelInterface);
    }

    fn definition(name: &str, schema: serde_json::Value) -> ContractDefinition {
        ContractDefinition {
            name: name.to_string(),
            schema: Schema(schema),
        }
    }

    #[tokio::test]
    async fn test_definition_edits_reach_codec() {
        let (_pool, catalog, codec) = setup_with_codec().await;

        catalog.add_definition(definition("coins", json!("utf8"))).await.unwrap();
        assert!(matches!(
            catalog.add_definition(definition("coins", json!("utf8"))).await,
            Err(CatalogError::AlreadyExists)
        ));
        assert_eq!(
            catalog.codec().decode(&Schema(json!("coins")), b"42").unwrap(),
            json!("42")
        );

        catalog.update_definition(definition("coins", json!({"kind": "varuint"}))).await.unwrap();
        assert_eq!(codec.definitions.lock().unwrap()["coins"], Schema(json!({"kind": "varuint"})));
        assert!(matches!(
            catalog.update_definition(definition("grams", json!("utf8"))).await,
            Err(CatalogError::NotFound)
        ));

        catalog.delete_definition("coins").await.unwrap();
        assert!(codec.definitions.lock().unwrap().is_empty());
        assert!(catalog.get_definitions().await.unwrap().is_empty());
        assert!(matches!(catalog.delete_definition("coins").await, Err(CatalogError::NotFound)));
    }

    #[tokio::test]
    async fn test_rejected_definition_is_not_stored() {
        let (_pool, catalog, codec) = setup_with_codec().await;

        catalog.add_definition(definition("coins", json!("utf8"))).await.unwrap();
        let err = catalog.add_definition(definition("broken", serde_json::Value::Null)).await;
        assert!(matches!(err, Err(CatalogError::Codec(_))));

        let stored = catalog.get_definitions().await.unwrap();
        assert_eq!(stored, vec![definition("coins", json!("utf8"))]);
        assert_eq!(codec.definitions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_requires_interfaces_and_registers_definitions() {
        let (pool, catalog, codec) = setup_with_codec().await;

        let err = prepare_catalog(&catalog).await.unwrap_err();
        assert!(matches!(err, IndexerError::NoInterfaces));

        // Rows written by another process are picked up at start
        let mut tx = pool.begin().await.unwrap();
        db::contract::insert_definition(&mut tx, &definition("coins", json!("utf8"))).await.unwrap();
        tx.commit().await.unwrap();
        catalog.add_interface(wallet()).await.unwrap();
        assert!(codec.definitions.lock().unwrap().is_empty());

        prepare_catalog(&catalog).await.unwrap();
        assert!(codec.definitions.lock().unwrap().contains_key("coins"));
    }
}
