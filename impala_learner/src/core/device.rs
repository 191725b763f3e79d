//! Explicit device selection.
//!
//! The device is resolved once when the learner is built and then passed to
//! every call that creates tensors (loss computation, checkpoint loading).

use burn::tensor::backend::Backend;

/// Device the learner's model and tensors live on.
#[derive(Debug, Clone)]
pub struct DeviceConfig<B: Backend> {
    device: B::Device,
}

impl<B: Backend> DeviceConfig<B> {
    /// Use a specific device.
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Resolve the backend's default device (first GPU for GPU backends,
    /// the CPU otherwise).
    pub fn resolve() -> Self {
        let device = B::Device::default();
        log::info!("Learner device resolved: {:?}", device);
        Self { device }
    }

    /// The selected device.
    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

impl<B: Backend> Default for DeviceConfig<B> {
    fn default() -> Self {
        Self::resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_resolve_matches_default_device() {
        let config = DeviceConfig::<TestBackend>::resolve();
        assert_eq!(
            config.device(),
            &<TestBackend as Backend>::Device::default()
        );
    }
}
