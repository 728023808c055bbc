use anyhow::{Context, Result};
use clap::Parser;
use model::{wait_encryption_key_migration, EncryptionSecret, Session};

/// Wait until every resource covered by an encryption key has been re-encrypted with it.
#[derive(Debug, Parser)]
pub(crate) struct WaitEncryptionMigration {
    /// The key secret in `openshift-config-managed`, e.g.
    /// `encryption-key-openshift-kube-apiserver-3`.
    secret: String,
}

impl WaitEncryptionMigration {
    pub(crate) async fn run(self, session: Session) -> Result<()> {
        let secret = EncryptionSecret::from_name(&self.secret)?;
        wait_encryption_key_migration(&session, &secret)
            .await
            .context(format!("Resources of '{}' were not migrated", self.secret))?;
        println!("{} migrated", self.secret);
        Ok(())
    }
}
