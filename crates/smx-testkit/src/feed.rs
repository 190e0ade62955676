use anyhow::Result;
use smx_chain::VerifiedClientFeed;
use smx_schemas::VerifiedClient;

/// Returns the same clients on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    pub clients: Vec<VerifiedClient>,
}

impl StaticFeed {
    pub fn new(clients: Vec<VerifiedClient>) -> Self {
        Self { clients }
    }
}

#[async_trait::async_trait]
impl VerifiedClientFeed for StaticFeed {
    async fn fetch(&self) -> Result<Vec<VerifiedClient>> {
        Ok(self.clients.clone())
    }
}
