//! Integrator strategies (simple, merged, fast) and the worker pool they
//! run on.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod common;
pub mod fast;
pub mod merged;
pub mod packet;
pub mod pool;
pub mod simple;

pub use fast::FastIntegrator;
pub use merged::MergedIntegrator;
pub use packet::{IntegrationStats, PointcloudPacket};
pub use pool::WorkerPool;
pub use simple::SimpleIntegrator;

use tsdfmap_core::{Config, Layer};

/// Common interface implemented by every integrator strategy. `tsdfmap-core`
/// provides `Config::method` to pick which one `tsdfmap-pipeline` should
/// construct.
pub trait Integrator: Send + Sync {
    /// Fold `packet`'s observations into `layer`.
    fn integrate(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config)
        -> IntegrationStats;

    /// Remove `packet`'s previously-integrated contribution from `layer`.
    /// An exact inverse of `integrate` for the same packet and config.
    fn deintegrate(
        &self,
        layer: &Layer,
        packet: &PointcloudPacket,
        config: &Config,
    ) -> IntegrationStats;
}

/// Build the integrator named by `config.method`.
#[must_use]
pub fn build(config: &Config) -> Box<dyn Integrator> {
    match config.method {
        tsdfmap_core::IntegratorMethod::Simple => Box::new(SimpleIntegrator::new()),
        tsdfmap_core::IntegratorMethod::Merged => {
            Box::new(MergedIntegrator::new(config.integrator_threads))
        }
        tsdfmap_core::IntegratorMethod::Fast => {
            Box::new(FastIntegrator::new(config.integrator_threads, config))
        }
    }
}
