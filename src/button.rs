//! Long-press detection for the provisioning reset button.

/// Reports a long press once per hold.
///
/// # Example
///
/// ```rust
/// use rs_dispenser::button::LongPress;
///
/// let mut lp = LongPress::new(5000);
/// assert!(!lp.update(true, 1000));
/// assert!(!lp.update(true, 5999));
/// assert!(lp.update(true, 6000));
/// assert!(!lp.update(true, 9000)); // still the same hold
/// assert!(!lp.update(false, 9100));
/// ```
#[derive(Clone, Debug)]
pub struct LongPress {
    hold_ms: u64,
    pressed_since: Option<u64>,
    fired: bool,
}

impl LongPress {
    /// Detector for holds of at least `hold_ms`.
    pub fn new(hold_ms: u64) -> Self {
        Self {
            hold_ms,
            pressed_since: None,
            fired: false,
        }
    }

    /// Feed the current button state. Returns true on the tick the hold
    /// reaches `hold_ms`.
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> bool {
        if !pressed {
            self.pressed_since = None;
            self.fired = false;
            return false;
        }
        let since = *self.pressed_since.get_or_insert(now_ms);
        if !self.fired && now_ms.saturating_sub(since) >= self.hold_ms {
            self.fired = true;
            return true;
        }
        false
    }

    /// Whether the button is currently being held.
    pub fn is_held(&self) -> bool {
        self.pressed_since.is_some()
    }
}
