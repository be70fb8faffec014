//! Mode post-processing on the mixed stereo pair.
//!
//! Only AntiSpace has a post stage: the stereo image is pulled toward mono
//! as the input gets wider, and the first samples of every block receive a
//! cross-feed from the opposite input channel.

use super::utils::clamp01;
use crate::controls::Controls;

/// Block-relative samples that receive the cross-feed.
pub const CROSS_FEED_SAMPLES: usize = 96;

#[inline]
pub fn anti_space(
    out_l: f32,
    out_r: f32,
    in_l: f32,
    in_r: f32,
    block_index: usize,
    controls: &Controls,
    instability: f32,
) -> (f32, f32) {
    let wide = (in_l - in_r).abs();
    let collapse = clamp01(1.0 - wide * 4.3 - instability * 0.3);
    let keep = collapse * (0.12 + 0.88 * controls.coherence);

    let mid = 0.5 * (out_l + out_r);
    let mut l = mid + (out_l - mid) * keep;
    let mut r = mid + (out_r - mid) * keep;

    if block_index < CROSS_FEED_SAMPLES {
        let pan = 0.25 + 0.5 * controls.entropy;
        l += in_r * pan;
        r += in_l * pan;
    }
    (l, r)
}
