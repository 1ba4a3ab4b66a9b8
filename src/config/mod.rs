// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration: the kubeconfig document and the job parameters
//!
//! # Environment Variables
//!
//! - `KUBECONFIG` - Set to the written file for the duration of the work unit
//!
//! # Example
//!
//! ```
//! use kubectl_setup::config::KubeConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KubeConfig::from_yaml("apiVersion: v1\nkind: Config\ncurrent-context: ci\n")?;
//! assert_eq!(config.current_context(), Some("ci"));
//! # Ok(())
//! # }
//! ```

mod kubeconfig;
mod parameters;

pub use kubeconfig::{
    Cluster, Context, ContextPatch, DanglingReference, KubeConfig, NamedCluster, NamedContext,
    NamedUser, User, API_VERSION, KIND,
};
pub use parameters::{
    KubectlParameters, KubectlParametersBuilder, DEFAULT_CLUSTER_NAME, DEFAULT_CONTEXT_NAME,
    DEFAULT_USER_NAME,
};

/// Environment variable through which `kubectl` finds the written file.
pub const ENV_KUBECONFIG: &str = "KUBECONFIG";
