//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Number of whitespace-delimited, non-empty tokens.
pub fn word_count(text: &str) -> usize {
  text.split_whitespace().count()
}

/// Round to one decimal place, halves away from zero.
pub fn round1(x: f32) -> f32 {
  (x * 10.0).round() / 10.0
}

/// One-decimal rounding of a non-negative average, matching JavaScript's `toFixed(1)`:
/// the decision is made on the exact value of `x`, with exact ties rounding up.
pub fn round1_f64(x: f64) -> f64 {
  let scaled = x * 10.0;
  let floor = scaled.floor();
  let tenths = if scaled - floor == 0.5 {
    // The product may have rounded onto the tie; the fused remainder is exact.
    if x.mul_add(10.0, -scaled) < 0.0 { floor } else { floor + 1.0 }
  } else {
    scaled.round()
  };
  tenths / 10.0
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}
