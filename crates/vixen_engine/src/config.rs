//! Engine configuration
//!
//! Plain data with serde derives; loading configuration files is the
//! host's concern.

use serde::{Deserialize, Serialize};

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Application name, used for logging context
    pub app_name: String,

    /// Renderer configuration
    pub renderer: RendererConfig,

    /// Worker bridge configuration
    pub worker: WorkerConfig,
}

/// Renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Enable Vulkan validation layers (debug builds only)
    pub validation: bool,

    /// Maximum number of frames in flight
    pub frames_in_flight: u32,

    /// Default swapchain image count hint
    pub swapchain_images: u32,
}

/// Worker bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Spawn the worker thread at engine construction
    pub enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "Vixen Application".to_string(),
            renderer: RendererConfig {
                validation: cfg!(debug_assertions),
                frames_in_flight: 2,
                swapchain_images: 3,
            },
            worker: WorkerConfig { enabled: true },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert!(config.renderer.frames_in_flight >= 1);
        assert!(config.renderer.swapchain_images >= 2);
        assert!(config.worker.enabled);
    }
}
