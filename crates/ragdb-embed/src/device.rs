use candle_core::Device;
use tracing::info;

/// CUDA or Metal when compiled in and available, CPU otherwise.
pub fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(dev) = Device::new_cuda(0) {
            info!("device: cuda:0");
            return dev;
        }
    }
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            info!("device: metal (mps)");
            return dev;
        }
    }
    info!("device: cpu");
    Device::Cpu
}
