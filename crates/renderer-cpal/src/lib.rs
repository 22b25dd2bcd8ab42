// Desktop audio output using cpal

mod cpal_renderer;

pub use cpal_renderer::CpalRenderer;
