//! Contract catalog: interface definitions, operation schemas and get-method
//! descriptors backed by the relational store.

pub mod cache;
pub mod keys;
pub mod matcher;

pub use cache::{CatalogCache, CatalogEntry};
pub use keys::CatalogKey;
pub use matcher::match_interfaces;

use crate::db;
use crate::decoder::{CellCodec, CodecError};
use crate::models::{
    ContractDefinition, ContractInterface, ContractOperation, GetMethodDesc, MessageType, RescanTask, RescanTaskType,
};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return Self::AlreadyExists;
            }
        }
        Self::Database(e)
    }
}

/// Shared view of the catalog. Reads go through the cache; every edit is
/// written together with the rescan task reconciling stored data.
pub struct ContractCatalog {
    pool: SqlitePool,
    codec: Arc<dyn CellCodec>,
    cache: CatalogCache,
    lock: RwLock<()>,
}

impl ContractCatalog {
    pub fn new(pool: SqlitePool, codec: Arc<dyn CellCodec>, capacity: u64, ttl: Duration) -> Self {
        Self {
            pool,
            codec,
            cache: CatalogCache::new(capacity, ttl),
            lock: RwLock::new(()),
        }
    }

    pub fn codec(&self) -> &Arc<dyn CellCodec> {
        &self.codec
    }

    pub async fn get_interfaces(&self) -> Result<Arc<Vec<ContractInterface>>, CatalogError> {
        let _guard = self.lock.read().await;

        if let Some(interfaces) = self.cache.interfaces().await {
            return Ok(interfaces);
        }

        let interfaces = Arc::new(db::contract::get_interfaces(&self.pool).await?);
        self.cache
            .insert(CatalogEntry::Interfaces(interfaces.clone()))
            .await;

        Ok(interfaces)
    }

    pub async fn get_interface(&self, name: &str) -> Result<ContractInterface, CatalogError> {
        self.get_interfaces()
            .await?
            .iter()
            .find(|i| i.name == name)
            .cloned()
            .ok_or(CatalogError::NotFound)
    }

    pub async fn get_operations(&self) -> Result<Arc<Vec<ContractOperation>>, CatalogError> {
        let _guard = self.lock.read().await;

        if let Some(operations) = self.cache.operations().await {
            return Ok(operations);
        }

        let operations = Arc::new(db::contract::get_operations(&self.pool).await?);
        self.cache
            .insert(CatalogEntry::Operations(operations.clone()))
            .await;

        Ok(operations)
    }

    /// Finds the operation of the first interface, in the given order, that
    /// defines `operation_id` for this message type and direction.
    pub async fn get_operation_by_id(
        &self,
        interfaces: &[String],
        message_type: MessageType,
        outgoing: bool,
        operation_id: u32,
    ) -> Result<ContractOperation, CatalogError> {
        let operations = self.get_operations().await?;

        interfaces
            .iter()
            .find_map(|name| {
                operations.iter().find(|op| {
                    &op.contract_name == name
                        && op.message_type == message_type
                        && op.outgoing == outgoing
                        && op.operation_id == operation_id
                })
            })
            .cloned()
            .ok_or(CatalogError::NotFound)
    }

    pub async fn get_method_desc(
        &self,
        contract_name: &str,
        method: &str,
    ) -> Result<GetMethodDesc, CatalogError> {
        self.get_interface(contract_name)
            .await?
            .get_method(method)
            .cloned()
            .ok_or(CatalogError::NotFound)
    }

    /// Forgets the cached tables. Called by the rescan engine before it starts
    /// a task so that it reads the edit that created the task.
    pub async fn invalidate(&self) {
        let _guard = self.lock.write().await;
        self.cache.invalidate_all();
    }

    pub async fn add_interface(&self, mut interface: ContractInterface) -> Result<(), CatalogError> {
        self.prepare_interface(&mut interface)?;

        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        db::contract::insert_interface(&mut tx, &interface).await?;
        enqueue(&mut tx, RescanTask::new(RescanTaskType::AddInterface, &interface.name)).await?;

        tx.commit().await?;
        self.cache.invalidate_all();

        info!(contract = %interface.name, "Added contract interface");
        Ok(())
    }

    pub async fn update_interface(&self, mut interface: ContractInterface) -> Result<(), CatalogError> {
        self.prepare_interface(&mut interface)?;

        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        if db::contract::update_interface(&mut tx, &interface).await? == 0 {
            return Err(CatalogError::NotFound);
        }
        enqueue(&mut tx, RescanTask::new(RescanTaskType::UpdInterface, &interface.name)).await?;

        tx.commit().await?;
        self.cache.invalidate_all();

        info!(contract = %interface.name, "Updated contract interface");
        Ok(())
    }

    /// Removes the interface and its operations.
    pub async fn delete_interface(&self, name: &str) -> Result<(), CatalogError> {
        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        if db::contract::delete_interface(&mut tx, name).await? == 0 {
            return Err(CatalogError::NotFound);
        }
        enqueue(&mut tx, RescanTask::new(RescanTaskType::DelInterface, name)).await?;

        tx.commit().await?;
        self.cache.invalidate_all();

        info!(contract = %name, "Deleted contract interface");
        Ok(())
    }

    pub async fn add_get_method(&self, contract_name: &str, desc: GetMethodDesc) -> Result<(), CatalogError> {
        let method = desc.name.clone();
        self.edit_get_methods(contract_name, RescanTaskType::AddGetMethod, &method, |methods| {
            if methods.iter().any(|m| m.name == desc.name) {
                return Err(CatalogError::AlreadyExists);
            }
            methods.push(desc);
            Ok(())
        })
        .await
    }

    pub async fn update_get_method(&self, contract_name: &str, desc: GetMethodDesc) -> Result<(), CatalogError> {
        let method = desc.name.clone();
        self.edit_get_methods(contract_name, RescanTaskType::UpdGetMethod, &method, |methods| {
            let slot = methods
                .iter_mut()
                .find(|m| m.name == desc.name)
                .ok_or(CatalogError::NotFound)?;
            *slot = desc;
            Ok(())
        })
        .await
    }

    pub async fn delete_get_method(&self, contract_name: &str, method: &str) -> Result<(), CatalogError> {
        self.edit_get_methods(contract_name, RescanTaskType::DelGetMethod, method, |methods| {
            let before = methods.len();
            methods.retain(|m| m.name != method);
            if methods.len() == before {
                return Err(CatalogError::NotFound);
            }
            Ok(())
        })
        .await
    }

    pub async fn add_operation(&self, op: ContractOperation) -> Result<(), CatalogError> {
        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        if db::contract::get_interface(&mut tx, &op.contract_name).await?.is_none() {
            return Err(CatalogError::NotFound);
        }
        db::contract::insert_operation(&mut tx, &op).await?;
        enqueue(&mut tx, operation_task(RescanTaskType::UpdOperation, &op)).await?;

        tx.commit().await?;
        self.cache.invalidate_all();

        info!(contract = %op.contract_name, operation = %op.operation_name, "Added contract operation");
        Ok(())
    }

    /// Replaces the operation with the same contract and operation name. If its
    /// dispatch key changed, messages decoded under the old key are cleared.
    pub async fn update_operation(&self, op: ContractOperation) -> Result<(), CatalogError> {
        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        let old = db::contract::get_operation(&mut tx, &op.contract_name, &op.operation_name)
            .await?
            .ok_or(CatalogError::NotFound)?;

        db::contract::update_operation(&mut tx, &op).await?;
        if (old.message_type, old.outgoing, old.operation_id) != (op.message_type, op.outgoing, op.operation_id) {
            enqueue(&mut tx, operation_task(RescanTaskType::DelOperation, &old)).await?;
        }
        enqueue(&mut tx, operation_task(RescanTaskType::UpdOperation, &op)).await?;

        tx.commit().await?;
        self.cache.invalidate_all();

        info!(contract = %op.contract_name, operation = %op.operation_name, "Updated contract operation");
        Ok(())
    }

    pub async fn delete_operation(&self, contract_name: &str, operation_name: &str) -> Result<(), CatalogError> {
        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        let op = db::contract::get_operation(&mut tx, contract_name, operation_name)
            .await?
            .ok_or(CatalogError::NotFound)?;

        db::contract::delete_operation(&mut tx, contract_name, operation_name).await?;
        enqueue(&mut tx, operation_task(RescanTaskType::DelOperation, &op)).await?;

        tx.commit().await?;
        self.cache.invalidate_all();

        info!(contract = %contract_name, operation = %operation_name, "Deleted contract operation");
        Ok(())
    }

    pub async fn get_definitions(&self) -> Result<Vec<ContractDefinition>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::contract::get_definitions(&mut conn).await?)
    }

    /// Hands the stored definitions to the codec.
    pub async fn register_definitions(&self) -> Result<usize, CatalogError> {
        let _guard = self.lock.read().await;
        let definitions = self.get_definitions().await?;
        self.codec.register_definitions(&definitions)?;
        Ok(definitions.len())
    }

    pub async fn add_definition(&self, definition: ContractDefinition) -> Result<(), CatalogError> {
        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        db::contract::insert_definition(&mut tx, &definition).await?;
        self.reload_definitions(&mut tx).await?;

        tx.commit().await?;

        info!(definition = %definition.name, "Added contract definition");
        Ok(())
    }

    pub async fn update_definition(&self, definition: ContractDefinition) -> Result<(), CatalogError> {
        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        if db::contract::update_definition(&mut tx, &definition).await? == 0 {
            return Err(CatalogError::NotFound);
        }
        self.reload_definitions(&mut tx).await?;

        tx.commit().await?;

        info!(definition = %definition.name, "Updated contract definition");
        Ok(())
    }

    pub async fn delete_definition(&self, name: &str) -> Result<(), CatalogError> {
        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        if db::contract::delete_definition(&mut tx, name).await? == 0 {
            return Err(CatalogError::NotFound);
        }
        self.reload_definitions(&mut tx).await?;

        tx.commit().await?;

        info!(definition = %name, "Deleted contract definition");
        Ok(())
    }

    /// Registers the definitions as seen by `conn`. A rejected set aborts the edit.
    async fn reload_definitions(&self, conn: &mut SqliteConnection) -> Result<(), CatalogError> {
        let definitions = db::contract::get_definitions(conn).await?;
        self.codec.register_definitions(&definitions)?;
        Ok(())
    }

    async fn edit_get_methods<F>(
        &self,
        contract_name: &str,
        task_type: RescanTaskType,
        method: &str,
        edit: F,
    ) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut Vec<GetMethodDesc>) -> Result<(), CatalogError>,
    {
        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        let mut interface = db::contract::get_interface(&mut tx, contract_name)
            .await?
            .ok_or(CatalogError::NotFound)?;

        edit(&mut interface.get_methods)?;
        interface.get_method_hashes = self.method_hashes(&interface.get_methods);

        db::contract::update_interface(&mut tx, &interface).await?;
        enqueue(
            &mut tx,
            RescanTask::new(task_type, contract_name).with_get_methods(vec![method.to_string()]),
        )
        .await?;

        tx.commit().await?;
        self.cache.invalidate_all();

        info!(contract = %contract_name, method = %method, task = %task_type, "Changed get-method");
        Ok(())
    }

    /// Derives the code hash and, when not given, the get-method hash set.
    fn prepare_interface(&self, interface: &mut ContractInterface) -> Result<(), CatalogError> {
        interface.code_hash = match &interface.code {
            Some(code) => Some(self.codec.cell_hash(code)?),
            None => None,
        };
        if interface.get_method_hashes.is_empty() {
            interface.get_method_hashes = self.method_hashes(&interface.get_methods);
        }
        Ok(())
    }

    fn method_hashes(&self, methods: &[GetMethodDesc]) -> Vec<i32> {
        let mut hashes: Vec<i32> = methods.iter().map(|m| self.codec.method_id(&m.name)).collect();
        hashes.sort_unstable();
        hashes.dedup();
        hashes
    }
}

fn operation_task(task_type: RescanTaskType, op: &ContractOperation) -> RescanTask {
    RescanTask::new(task_type, &op.contract_name).with_operation(op.message_type, op.outgoing, op.operation_id)
}

async fn enqueue(conn: &mut SqliteConnection, task: RescanTask) -> Result<i64, sqlx::Error> {
    db::rescan::add_task(conn, &task).await
}
