use candle_core::Device;
use tracing::info;

/// Prefer an accelerator when the matching feature is compiled in.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) { info!("Embedding device: Metal"); return dev; }
    }
    #[cfg(feature = "cuda")]
    {
        if let Ok(dev) = Device::new_cuda(0) { info!("Embedding device: CUDA"); return dev; }
    }
    info!("Embedding device: CPU");
    Device::Cpu
}
