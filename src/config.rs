//! Runtime knobs for the viewer. Placement data lives in [`crate::layout`].

use std::time::Duration;

use winit::keyboard::KeyCode;

/// Environment variable overriding the directory assets are read from (native only).
pub const ASSET_ROOT_ENV: &str = "ROADSCAPE_ASSETS";

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// No retries, used where a single failure should be reported right away.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay after the given failed attempt (1-based), doubling up to `max_backoff`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub asset_root: std::path::PathBuf,
    pub background: String,
    pub retry: RetryPolicy,
    pub overlay_key: KeyCode,
    pub clear_color: wgpu::Color,
}

impl SceneConfig {
    /// Defaults with the asset root taken from `ROADSCAPE_ASSETS` when it is set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(root) = std::env::var(ASSET_ROOT_ENV) {
            log::info!("reading assets from {}", root);
            config.asset_root = root.into();
        }
        config
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            title: "roadscape".to_string(),
            width: 1280,
            height: 720,
            asset_root: std::path::Path::new("./").join("assets"),
            background: "textures/sky.png".to_string(),
            retry: RetryPolicy::default(),
            overlay_key: KeyCode::F1,
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 1.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }
}
