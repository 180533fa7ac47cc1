//! Key handling during streaming.

/// A key press delivered by the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Other,
}

/// What a key press asks the stream loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    ToggleFrameRateDisplay,
    ToggleEffectEnabled,
    ToggleVisualizationOverlay,
    Quit,
}

/// Maps `key` to an action. The effect and overlay toggles only apply to
/// live camera input.
pub fn action_for_key(key: Key, live: bool) -> KeyAction {
    match key {
        Key::Escape | Key::Char('q') | Key::Char('Q') => KeyAction::Quit,
        Key::Char('f') | Key::Char('F') => KeyAction::ToggleFrameRateDisplay,
        Key::Char('e') | Key::Char('E') if live => KeyAction::ToggleEffectEnabled,
        Key::Char('d') | Key::Char('D') if live => KeyAction::ToggleVisualizationOverlay,
        _ => KeyAction::Continue,
    }
}

/// Session flags mutated by key actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFlags {
    pub show_fps: bool,
    pub effect_enabled: bool,
    pub draw_visualization: bool,
}

impl Default for DisplayFlags {
    fn default() -> Self {
        Self {
            show_fps: false,
            effect_enabled: true,
            draw_visualization: true,
        }
    }
}

impl DisplayFlags {
    /// Applies `action`; returns true when it asks to quit.
    pub fn apply(&mut self, action: KeyAction) -> bool {
        match action {
            KeyAction::Continue => {}
            KeyAction::ToggleFrameRateDisplay => self.show_fps = !self.show_fps,
            KeyAction::ToggleEffectEnabled => self.effect_enabled = !self.effect_enabled,
            KeyAction::ToggleVisualizationOverlay => self.draw_visualization = !self.draw_visualization,
            KeyAction::Quit => return true,
        }
        false
    }
}
