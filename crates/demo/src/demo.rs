// The container: three panels side by side

use crate::panel::{Control, Panel, Pressed};
use looptrack_core::{AudioError, DemoConfig, Result};
use looptrack_session::{BufferSession, ElementSession, GraphSession, Platform};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Demo {
    panels: Vec<Panel>,
}

impl Demo {
    pub fn new(platform: Arc<dyn Platform>, config: &DemoConfig) -> Self {
        let src = config.resolve_asset();
        log::info!("Demo asset: {}", src);
        let panels = vec![
            Panel::new(
                "1. AudioElement",
                Box::new(ElementSession::new(platform.as_ref(), src.clone())),
            ),
            Panel::new(
                "2. AudioBufferSourceNode",
                Box::new(BufferSession::new(platform.clone(), src.clone(), config.gain)),
            ),
            Panel::new(
                "3. MediaElementAudioSourceNode",
                Box::new(GraphSession::new(platform, src, config.gain)),
            ),
        ];
        Self { panels }
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn panel(&self, index: usize) -> Option<&Panel> {
        self.panels.get(index)
    }

    /// Press `control` on the panel at zero-based `index`
    pub fn press(&mut self, index: usize, control: Control) -> Result<Pressed> {
        let count = self.panels.len();
        let panel = self.panels.get_mut(index).ok_or_else(|| {
            AudioError::InvalidState(format!("No panel {} (have {})", index + 1, count))
        })?;
        panel.press(control)
    }

    /// Wait for every in-flight load, sharing one deadline. Returns the
    /// title and outcome of each load that finished.
    pub fn wait_loads(&mut self, timeout: Duration) -> Vec<(String, Result<()>)> {
        let deadline = Instant::now() + timeout;
        let mut finished = Vec::new();
        for panel in &mut self.panels {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(result) = panel.wait_load(remaining) {
                finished.push((panel.title().to_string(), result));
            }
        }
        finished
    }

    /// Collect loads that already finished, without blocking
    pub fn poll_loads(&mut self) -> Vec<(String, Result<()>)> {
        self.panels
            .iter_mut()
            .filter_map(|panel| {
                let result = panel.poll_load()?;
                Some((panel.title().to_string(), result))
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("WebAudio API demo\n");
        for panel in &self.panels {
            out.push_str(&format!("  {}\n", panel));
        }
        out
    }
}
