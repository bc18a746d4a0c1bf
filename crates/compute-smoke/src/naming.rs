//! Random resource names
//!
//! Every name the harness generates starts with the configured prefix, so
//! leftovers from crashed runs can be found by the orphan sweeper.

use rand::Rng;

/// Build a unique name: `{prefix}-{base}-{random}`
///
/// An empty `base` yields `{prefix}-{random}`; an empty prefix drops the
/// leading segment.
pub fn rand_name(prefix: &str, base: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1..=0x7fff_ffff);
    let mut name = String::with_capacity(prefix.len() + base.len() + 12);
    if !prefix.is_empty() {
        name.push_str(prefix);
        name.push('-');
    }
    if !base.is_empty() {
        name.push_str(base);
        name.push('-');
    }
    name.push_str(&suffix.to_string());
    name
}
