//! Local window input → view-state event conversion.
//!
//! Window events never touch the pose directly; they are translated
//! into [`InputEvent`]s that the service applies to the session's view
//! state once per tick.

use frameline_core::{Direction, InputEvent};

/// Keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    W,
    A,
    S,
    D,
    Space,
    LeftShift,
    Left,
    Right,
    Escape,
}

/// An event from the window system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// Key held during this tick.
    Key(Key),
    Resize(u32, u32),
    Close,
}

/// What the service does with a window event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    View(InputEvent),
    Resize(u32, u32),
    Quit,
}

/// Convert a window event into an action.
pub fn translate_event(event: &WindowEvent, turn_rate_deg: f32) -> InputAction {
    match *event {
        WindowEvent::Key(key) => match key {
            Key::W => InputAction::View(InputEvent::Move(Direction::Forward)),
            Key::S => InputAction::View(InputEvent::Move(Direction::Back)),
            Key::A => InputAction::View(InputEvent::Move(Direction::Left)),
            Key::D => InputAction::View(InputEvent::Move(Direction::Right)),
            Key::Space => InputAction::View(InputEvent::Move(Direction::Up)),
            Key::LeftShift => InputAction::View(InputEvent::Move(Direction::Down)),
            Key::Left => InputAction::View(InputEvent::Turn {
                yaw_degrees: -turn_rate_deg,
            }),
            Key::Right => InputAction::View(InputEvent::Turn {
                yaw_degrees: turn_rate_deg,
            }),
            Key::Escape => InputAction::Quit,
        },
        WindowEvent::Resize(w, h) => InputAction::Resize(w, h),
        WindowEvent::Close => InputAction::Quit,
    }
}

// ── Autopilot ────────────────────────────────────────────────────

/// Length of one pass through the autopilot script, in ticks.
const SCRIPT_TICKS: u64 = 240;

/// Scripted stand-in for a user at the keyboard.
///
/// Walks forward, turns, strafes and bobs up and down on a fixed cycle,
/// and optionally resizes the window once.
#[derive(Debug)]
pub struct Autopilot {
    tick: u64,
    resize_at: Option<u64>,
}

impl Autopilot {
    /// `resize_at == 0` never resizes.
    pub fn new(resize_at: u64) -> Self {
        Self {
            tick: 0,
            resize_at: (resize_at > 0).then_some(resize_at),
        }
    }

    /// Events for the next tick.
    pub fn poll(&mut self) -> Vec<WindowEvent> {
        let mut events = Vec::with_capacity(2);
        let key = match self.tick % SCRIPT_TICKS {
            0..80 => Key::W,
            80..120 => Key::Right,
            120..160 => Key::D,
            160..180 => Key::Space,
            180..200 => Key::LeftShift,
            _ => Key::Left,
        };
        events.push(WindowEvent::Key(key));
        if self.resize_at == Some(self.tick) {
            events.push(WindowEvent::Resize(1280, 720));
        }
        self.tick += 1;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_view_events() {
        assert_eq!(
            translate_event(&WindowEvent::Key(Key::W), 2.0),
            InputAction::View(InputEvent::Move(Direction::Forward))
        );
        assert_eq!(
            translate_event(&WindowEvent::Key(Key::Left), 2.0),
            InputAction::View(InputEvent::Turn { yaw_degrees: -2.0 })
        );
        assert_eq!(
            translate_event(&WindowEvent::Key(Key::Escape), 2.0),
            InputAction::Quit
        );
        assert_eq!(
            translate_event(&WindowEvent::Resize(640, 480), 2.0),
            InputAction::Resize(640, 480)
        );
    }

    #[test]
    fn autopilot_resizes_once() {
        let mut pilot = Autopilot::new(3);
        let resizes = (0..SCRIPT_TICKS * 2)
            .flat_map(|_| pilot.poll())
            .filter(|e| matches!(e, WindowEvent::Resize(..)))
            .count();
        assert_eq!(resizes, 1);
    }

    #[test]
    fn autopilot_without_resize() {
        let mut pilot = Autopilot::new(0);
        assert!((0..10).all(|_| pilot.poll().len() == 1));
        assert_eq!(pilot.poll(), vec![WindowEvent::Key(Key::W)]);
    }
}
