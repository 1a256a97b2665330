//! Iteration helpers for block processing.

/// Iterator that walks a slice in fractional steps, linearly interpolating
/// between neighbouring samples.
///
/// A step of `1.0` yields the slice unchanged, `0.5` yields every sample
/// and the midpoint after it, `2.0` yields every other sample. Useful for
/// varispeed playback and for downsampling a block for display.
///
/// ```rust
/// use cadenza_core::iter::FloatStep;
///
/// let data = [0.0, 1.0, 2.0];
/// let halved: Vec<f32> = FloatStep::new(&data, 0.5).collect();
/// assert_eq!(halved, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
/// ```
#[derive(Debug, Clone)]
pub struct FloatStep<'a> {
    data: &'a [f32],
    position: f64,
    step: f64,
}

impl<'a> FloatStep<'a> {
    /// Creates an iterator over `data` advancing `step` samples per item.
    ///
    /// # Panics
    ///
    /// Panics if `step` is not positive.
    pub fn new(data: &'a [f32], step: f32) -> Self {
        assert!(step > 0.0, "FloatStep step must be positive, got {}", step);
        Self {
            data,
            position: 0.0,
            step: f64::from(step),
        }
    }

    /// Current fractional read position.
    pub fn position(&self) -> f64 {
        self.position
    }
}

impl Iterator for FloatStep<'_> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let last = self.data.len().checked_sub(1)?;
        if self.position > last as f64 {
            return None;
        }
        let index = self.position as usize;
        let current = self.data[index];
        let frac = (self.position - index as f64) as f32;
        let value = match self.data.get(index + 1) {
            Some(&next) if frac > 0.0 => current + (next - current) * frac,
            _ => current,
        };
        self.position += self.step;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let Some(last) = self.data.len().checked_sub(1) else {
            return (0, Some(0));
        };
        let remaining = last as f64 - self.position;
        if remaining < 0.0 {
            return (0, Some(0));
        }
        let n = (remaining / self.step).floor() as usize + 1;
        (n, Some(n))
    }
}

/// Zips three iterators into an iterator of triples.
pub fn zip3<A, B, C>(
    a: A,
    b: B,
    c: C,
) -> impl Iterator<Item = (A::Item, B::Item, C::Item)>
where
    A: IntoIterator,
    B: IntoIterator,
    C: IntoIterator,
{
    a.into_iter()
        .zip(b)
        .zip(c)
        .map(|((a, b), c)| (a, b, c))
}

/// Writes planar stereo into an interleaved frame buffer.
///
/// `output` holds `channels` samples per frame. Mono outputs receive the
/// average of both channels; channels beyond the second are zeroed. Frames
/// beyond the shorter input are left untouched.
pub fn interleave_stereo(left: &[f32], right: &[f32], output: &mut [f32], channels: usize) {
    if channels == 0 {
        return;
    }
    for (frame, (&l, &r)) in output
        .chunks_exact_mut(channels)
        .zip(left.iter().zip(right))
    {
        match frame {
            [mono] => *mono = (l + r) * 0.5,
            [out_l, out_r, rest @ ..] => {
                *out_l = l;
                *out_r = r;
                rest.fill(0.0);
            }
            [] => {}
        }
    }
}

/// Splits an interleaved buffer into per-channel slices.
///
/// Copies `min(frames)` frames; extra input channels are ignored.
pub fn deinterleave(input: &[f32], channels: usize, outputs: &mut [&mut [f32]]) {
    if channels == 0 {
        return;
    }
    for (i, frame) in input.chunks_exact(channels).enumerate() {
        for (out, &sample) in outputs.iter_mut().zip(frame) {
            if let Some(slot) = out.get_mut(i) {
                *slot = sample;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_step_unit_is_identity() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let out: Vec<f32> = FloatStep::new(&data, 1.0).collect();
        assert_eq!(out, data.to_vec());
    }

    #[test]
    fn test_float_step_skips() {
        let data = [0.0, 1.0, 2.0, 3.0, 4.0];
        let out: Vec<f32> = FloatStep::new(&data, 2.0).collect();
        assert_eq!(out, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_float_step_size_hint_matches_count() {
        let data = [0.0; 10];
        for step in [0.25f32, 0.5, 1.0, 1.5, 3.0] {
            let iter = FloatStep::new(&data, step);
            let hint = iter.size_hint().0;
            assert_eq!(hint, iter.count(), "step {}", step);
        }
    }

    #[test]
    fn test_zip3() {
        let a = [1, 2, 3];
        let b = ['a', 'b', 'c'];
        let c = [true, false];
        let out: Vec<_> = zip3(a, b, c).collect();
        assert_eq!(out, vec![(1, 'a', true), (2, 'b', false)]);
    }

    #[test]
    fn test_interleave_stereo() {
        let mut out = [9.0; 6];
        interleave_stereo(&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0], &mut out, 2);
        assert_eq!(out, [1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn test_interleave_to_mono_and_surround() {
        let mut mono = [0.0; 2];
        interleave_stereo(&[1.0, 0.0], &[0.0, 1.0], &mut mono, 1);
        assert_eq!(mono, [0.5, 0.5]);

        let mut quad = [7.0; 8];
        interleave_stereo(&[1.0, 2.0], &[3.0, 4.0], &mut quad, 4);
        assert_eq!(quad, [1.0, 3.0, 0.0, 0.0, 2.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_deinterleave() {
        let input = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut l = [0.0; 3];
        let mut r = [0.0; 3];
        deinterleave(&input, 2, &mut [&mut l[..], &mut r[..]]);
        assert_eq!(l, [1.0, 3.0, 5.0]);
        assert_eq!(r, [2.0, 4.0, 6.0]);
    }
}
