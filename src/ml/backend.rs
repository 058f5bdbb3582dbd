// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// Every use case is written once, generic over a burn
// AutodiffBackend. `dispatch` picks the concrete backend at
// runtime from the --device flag:
//
//   cpu → Autodiff<NdArray>
//   gpu → Autodiff<Wgpu>
//
// Inference code uses `B::InnerBackend` to skip autodiff overhead.

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    #[default]
    Gpu,
}

/// Work that needs a concrete backend. Implemented by the use cases.
pub trait BackendTask {
    type Output;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<Self::Output>;
}

pub fn dispatch<T: BackendTask>(device: ComputeDevice, task: T) -> Result<T::Output> {
    match device {
        ComputeDevice::Cpu => {
            tracing::info!("Using NdArray CPU backend");
            task.run::<Autodiff<NdArray>>(NdArrayDevice::Cpu)
        }
        ComputeDevice::Gpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            task.run::<Autodiff<Wgpu>>(device)
        }
    }
}

/// Seed burn's tensor RNG (weight init, dropout) when requested.
pub fn seed_backend<B: Backend>(seed: Option<u64>) {
    if let Some(seed) = seed {
        B::seed(seed);
        tracing::debug!("Seeded backend RNG with {}", seed);
    }
}
