//! Written-paper countdown. Owned by the controller and driven by an external
//! one-second tick; it never schedules anything itself.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Countdown {
  remaining: u32,
  running: bool,
}

impl Countdown {
  pub fn start(&mut self, secs: u32) {
    self.remaining = secs;
    self.running = true;
  }

  /// Stopping an idle countdown is a no-op.
  pub fn stop(&mut self) {
    self.running = false;
  }

  /// Advance one second. Returns the remaining time; stops itself at zero.
  pub fn tick(&mut self) -> u32 {
    if self.running {
      self.remaining = self.remaining.saturating_sub(1);
      if self.remaining == 0 {
        self.running = false;
      }
    }
    self.remaining
  }

  pub fn remaining(&self) -> u32 {
    self.remaining
  }

  pub fn is_running(&self) -> bool {
    self.running
  }

  pub fn display(&self) -> String {
    format_clock(self.remaining)
  }
}

/// `h:mm:ss` when an hour or more is left, `m:ss` otherwise.
pub fn format_clock(secs: u32) -> String {
  let h = secs / 3600;
  let m = (secs % 3600) / 60;
  let s = secs % 60;
  if h > 0 {
    format!("{}:{:02}:{:02}", h, m, s)
  } else {
    format!("{}:{:02}", m, s)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ticks_down_and_stops_at_zero() {
    let mut c = Countdown::default();
    c.start(2);
    assert_eq!(c.tick(), 1);
    assert!(c.is_running());
    assert_eq!(c.tick(), 0);
    assert!(!c.is_running());
    assert_eq!(c.tick(), 0);
  }

  #[test]
  fn idle_countdown_does_not_move() {
    let mut c = Countdown::default();
    c.start(10);
    c.stop();
    c.stop();
    assert_eq!(c.tick(), 10);
  }

  #[test]
  fn clock_formatting() {
    assert_eq!(format_clock(150 * 60), "2:30:00");
    assert_eq!(format_clock(3605), "1:00:05");
    assert_eq!(format_clock(65), "1:05");
    assert_eq!(format_clock(0), "0:00");
  }
}
