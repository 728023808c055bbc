/*!

Provides fixtures for running end-to-end scenarios against a live cluster through `oc`.
Everything about the target cluster comes from `E2E_*` environment variables, see
[`Cluster::from_env`].

!*/

pub mod cluster;
mod test_settings;

pub use cluster::{Cluster, ScopedProject};
