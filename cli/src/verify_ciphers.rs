use anyhow::{Context, Result};
use clap::Parser;
use model::{verify_ciphers, CipherExpectation, ConfigSource, Session};

/// Wait for components of a standalone cluster to serve the expected ciphers.
#[derive(Debug, Parser)]
pub(crate) struct VerifyCiphers {
    /// The expected configuration, e.g.
    /// `["TLS_AES_128_GCM_SHA256","TLS_AES_256_GCM_SHA384"] VersionTLS13`.
    expected: CipherExpectation,

    /// Only check these components [authentication|openshift-apiserver|kube-apiserver]. All
    /// three are checked, in that order, when omitted.
    #[clap(long = "source")]
    sources: Vec<ConfigSource>,
}

impl VerifyCiphers {
    pub(crate) async fn run(self, session: Session) -> Result<()> {
        let sources = if self.sources.is_empty() {
            ConfigSource::ALL.to_vec()
        } else {
            self.sources
        };
        for source in sources {
            verify_ciphers(&session, &self.expected, source)
                .await
                .context(format!("{} is not serving the expected ciphers", source))?;
            println!("{}: {}", source, self.expected);
        }
        Ok(())
    }
}
