
use std::sync::Arc;

use async_trait::async_trait;
use core_executor::models::DataQueryResult;
use core_executor::params::Params;
use core_executor::session::{ChunkStream, OperationSettings, ScanSettings};
use core_executor::tx::TxControl;
use core_executor::{Session, SessionProvider, TransportError};

mockall::mock! {
    pub YdbSession {}

    #[async_trait]
    impl Session for YdbSession {
        async fn execute_data_query(
            &self,
            query: &str,
            tx: TxControl,
            params: &Params,
            settings: &OperationSettings,
        ) -> Result<DataQueryResult, TransportError>;

        fn execute_scan_query(
            &self,
            query: &str,
            params: &Params,
            settings: &ScanSettings,
        ) -> ChunkStream;

        async fn execute_scheme_query(
            &self,
            query: &str,
            settings: &OperationSettings,
        ) -> Result<(), TransportError>;
    }
}

/// Hands out one session for every acquire.
pub struct FixedProvider {
    session: Arc<dyn Session>,
}

impl FixedProvider {
    pub fn new(session: MockYdbSession) -> Arc<dyn SessionProvider> {
        Arc::new(Self {
            session: Arc::new(session),
        })
    }

    /// A provider whose session must never be used.
    pub fn unused() -> Arc<dyn SessionProvider> {
        Self::new(MockYdbSession::new())
    }
}

#[async_trait]
impl SessionProvider for FixedProvider {
    async fn acquire(&self) -> Result<Arc<dyn Session>, TransportError> {
        Ok(Arc::clone(&self.session))
    }
}
