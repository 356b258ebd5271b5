use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_postgres::Client;

use crate::providers::ProviderSet;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Client>>,
    pub providers: Arc<ProviderSet>,
    pub storage: Option<StorageClient>,
}
