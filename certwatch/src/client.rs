//! Builds the Kubernetes client that scans are run against.

use crate::scan::SecretSource;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube_client::{
    api::{Api, ListParams},
    config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError},
    Config,
};
use std::path::PathBuf;
use thiserror::Error;

pub use kube_client::Client;

/// Command-line arguments used to configure the Kubernetes client
#[derive(Clone, Debug, Default, clap::Args)]
pub struct ClientArgs {
    /// Path to a kubeconfig file.
    ///
    /// When unset, the file named by `KUBECONFIG` or `~/.kube/config` is used,
    /// falling back to the pod's service account when running in-cluster.
    #[clap(long)]
    pub kubeconfig: Option<PathBuf>,

    /// The kubeconfig context to use
    #[clap(long)]
    pub context: Option<String>,
}

/// Indicates that no Kubernetes client could be configured
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The kubeconfig could not be loaded
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    /// Neither a kubeconfig nor in-cluster credentials could be found
    #[error("failed to infer cluster configuration: {0}")]
    Infer(#[from] InferConfigError),

    /// The client could not be built from the configuration
    #[error("failed to create Kubernetes client: {0}")]
    Client(#[from] kube_client::Error),
}

// === impl ClientArgs ===

impl ClientArgs {
    /// Resolves cluster credentials and builds a client.
    pub async fn try_client(self) -> Result<Client, ConfigError> {
        let config = self.try_config().await?;
        Ok(Client::try_from(config)?)
    }

    async fn try_config(self) -> Result<Config, ConfigError> {
        let options = KubeConfigOptions {
            context: self.context,
            ..Default::default()
        };

        if let Some(path) = self.kubeconfig {
            tracing::debug!(path = %path.display(), "Loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path)?;
            return Ok(Config::from_custom_kubeconfig(kubeconfig, &options).await?);
        }

        // An explicit context only makes sense with a kubeconfig.
        if options.context.is_some() {
            return Ok(Config::from_kubeconfig(&options).await?);
        }

        Ok(Config::infer().await?)
    }
}

// === impl Client ===

impl SecretSource for Client {
    type Error = kube_client::Error;

    async fn list_namespaces(&self) -> Result<Vec<String>, Self::Error> {
        let api = Api::<Namespace>::all(self.clone());
        let namespaces = api.list(&ListParams::default()).await?;
        Ok(namespaces
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, Self::Error> {
        let api = Api::<Secret>::namespaced(self.clone(), namespace);
        let secrets = api.list(&ListParams::default()).await?;
        Ok(secrets.items)
    }
}
