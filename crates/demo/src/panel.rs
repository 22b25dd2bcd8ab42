// One demo panel: a titled session with Load / Play / Stop controls

use looptrack_core::{Pending, Result, SessionState};
use looptrack_session::Session;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Load,
    Play,
    Stop,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Control::Load => "Load",
            Control::Play => "Play",
            Control::Stop => "Stop",
        };
        f.write_str(name)
    }
}

/// Which controls are enabled, plus the "played" highlight on Play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub load: bool,
    pub play: bool,
    pub stop: bool,
    pub played: bool,
}

impl Controls {
    pub fn enabled(&self, control: Control) -> bool {
        match control {
            Control::Load => self.load,
            Control::Play => self.play,
            Control::Stop => self.stop,
        }
    }
}

/// Outcome of pressing a control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressed {
    Applied,
    /// The control was disabled; nothing happened
    Disabled,
}

pub struct Panel {
    title: String,
    session: Box<dyn Session>,
    load: Option<Pending<()>>,
}

impl Panel {
    pub fn new(title: impl Into<String>, session: Box<dyn Session>) -> Self {
        Self {
            title: title.into(),
            session,
            load: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    pub fn controls(&self) -> Controls {
        let state = self.session.state();
        Controls {
            load: state == SessionState::Unloaded,
            play: state.loaded(),
            stop: state.loaded(),
            played: state.playing(),
        }
    }

    pub fn press(&mut self, control: Control) -> Result<Pressed> {
        if !self.controls().enabled(control) {
            log::debug!("{}: {} is disabled", self.title, control);
            return Ok(Pressed::Disabled);
        }
        log::info!("{}: {}", self.title, control);
        match control {
            Control::Load => {
                if let Some(pending) = self.session.load() {
                    self.load = Some(pending);
                }
            }
            Control::Play => self.session.play()?,
            Control::Stop => self.session.stop()?,
        }
        Ok(Pressed::Applied)
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_some()
    }

    /// Wait up to `timeout` for an in-flight load. `None` if there is none
    /// or it is still running.
    pub fn wait_load(&mut self, timeout: Duration) -> Option<Result<()>> {
        let result = self.load.as_ref()?.wait_timeout(timeout)?;
        self.load = None;
        Some(result)
    }

    /// Non-blocking variant of `wait_load`
    pub fn poll_load(&mut self) -> Option<Result<()>> {
        let result = self.load.as_ref()?.try_take()?;
        self.load = None;
        Some(result)
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let controls = self.controls();
        let button = |control: Control, label: String| {
            if controls.enabled(control) {
                format!("[{}]", label)
            } else {
                format!(" {} ", label.to_lowercase())
            }
        };
        let play = if controls.played {
            "Play*".to_string()
        } else {
            "Play".to_string()
        };

        write!(
            f,
            "{:<32} {} {} {}  {}",
            self.title,
            button(Control::Load, Control::Load.to_string()),
            button(Control::Play, play),
            button(Control::Stop, Control::Stop.to_string()),
            self.session.state()
        )?;
        if let Some(position) = self.session.position() {
            write!(f, " @ {:.2}s", position)?;
        }
        Ok(())
    }
}
