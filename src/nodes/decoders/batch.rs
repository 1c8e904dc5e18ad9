//! Frame-batch driver over a single-wave decode primitive
//!
//! [`BatchDecoder`] accepts `n_frames` logical frames per call while the
//! wrapped [`WaveDecoder`] only processes `simd_inter_frame_level` frames
//! (one "wave") at a time. Full waves stream through per-wave staging
//! buffers; a partial last wave is padded on load and truncated on store.
//! When a single full wave covers the whole call, staging is skipped and
//! the hooks run directly on the caller's buffers.

use std::time::{Duration, Instant};

use super::WaveDecoder;
use crate::code::ConstructionError;
use crate::nodes::ShapeError;
use crate::{Bit, Llr};

/// Switches of one `decode` call
#[derive(Debug, Clone, Copy)]
pub struct DecodeOpts {
    /// Copy the input into the decoder before decoding
    pub load: bool,
    /// Copy the results out after decoding
    pub store: bool,
    /// Use the decoder's fast (possibly non-canonical) store
    pub store_fast: bool,
    /// Convert a fast-stored buffer back to canonical bits
    pub unpack: bool,
}

impl Default for DecodeOpts {
    fn default() -> Self {
        Self {
            load: true,
            store: true,
            store_fast: false,
            unpack: false,
        }
    }
}

#[derive(Clone, Copy)]
enum StoreMode {
    Information,
    Codeword,
}

/// Multi-frame decode contract wrapping a single-wave primitive
pub struct BatchDecoder<D> {
    inner: D,
    k: usize,
    n: usize,
    n_frames: usize,
    simd_inter_frame_level: usize,
    n_dec_waves: usize,
    n_inter_frame_rest: usize,
    y_w: Vec<Vec<Llr>>,
    v_w: Vec<Vec<Bit>>,
    d_load: Duration,
    d_decode: Duration,
    d_store: Duration,
}

impl<D: WaveDecoder> BatchDecoder<D> {
    /// Wrap a wave decoder for `n_frames` logical frames per call.
    ///
    /// Dimensions come from the inner decoder; all of K, N, the SIMD width
    /// and `n_frames` must be non-zero and K must not exceed N.
    pub fn new(n_frames: usize, inner: D) -> Result<Self, ConstructionError> {
        let k = inner.k();
        let n = inner.n();
        let simd = inner.simd_inter_frame_level();
        if k == 0 {
            return Err(ConstructionError::Zero { what: "K" });
        }
        if n == 0 {
            return Err(ConstructionError::Zero { what: "N" });
        }
        if simd == 0 {
            return Err(ConstructionError::Zero {
                what: "simd_inter_frame_level",
            });
        }
        if n_frames == 0 {
            return Err(ConstructionError::Zero { what: "n_frames" });
        }
        if k > n {
            return Err(ConstructionError::KLargerThanN { k, n });
        }

        let n_dec_waves = n_frames.div_ceil(simd);
        let n_inter_frame_rest = n_frames % simd;

        Ok(Self {
            inner,
            k,
            n,
            n_frames,
            simd_inter_frame_level: simd,
            n_dec_waves,
            n_inter_frame_rest,
            y_w: vec![vec![0.0; simd * n]; n_dec_waves],
            v_w: vec![vec![0; simd * n]; n_dec_waves],
            d_load: Duration::ZERO,
            d_decode: Duration::ZERO,
            d_store: Duration::ZERO,
        })
    }

    /// Number of information bits per frame
    pub fn k(&self) -> usize {
        self.k
    }

    /// Codeword length per frame
    pub fn n(&self) -> usize {
        self.n
    }

    /// Logical frames per call
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Frames absorbed per wave by the inner decoder
    pub fn simd_inter_frame_level(&self) -> usize {
        self.simd_inter_frame_level
    }

    /// Number of waves per call
    pub fn n_dec_waves(&self) -> usize {
        self.n_dec_waves
    }

    /// Frames in the last wave when it is partial, zero otherwise
    pub fn n_inter_frame_rest(&self) -> usize {
        self.n_inter_frame_rest
    }

    /// The wrapped wave decoder
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Mutable access to the wrapped wave decoder
    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    /// Time spent loading during the last `decode` call
    pub fn load_duration(&self) -> Duration {
        self.d_load
    }

    /// Time spent decoding during the last `decode` call
    pub fn decode_duration(&self) -> Duration {
        self.d_decode
    }

    /// Time spent storing during the last `decode` call
    pub fn store_duration(&self) -> Duration {
        self.d_store
    }

    /// Decode with the default switches (load and store enabled)
    pub fn decode(&mut self, y_n: &[Llr], v_out: &mut [Bit]) -> Result<(), ShapeError> {
        self.decode_with(y_n, v_out, DecodeOpts::default())
    }

    /// Decode `n_frames` logical frames.
    ///
    /// `y_n` must hold exactly `N * n_frames` LLRs. `v_out` selects the
    /// store convention by its length: `K * n_frames` stores information
    /// bits only, `N * n_frames` stores full codewords; anything else (with
    /// store enabled) is a shape inconsistency. The load/decode/store phase
    /// durations are reset at entry and accumulated across this call's
    /// waves.
    pub fn decode_with(
        &mut self,
        y_n: &[Llr],
        v_out: &mut [Bit],
        opts: DecodeOpts,
    ) -> Result<(), ShapeError> {
        if y_n.len() != self.n * self.n_frames {
            return Err(ShapeError::InputLength {
                expected: self.n * self.n_frames,
                got: y_n.len(),
            });
        }
        if v_out.len() > self.n * self.n_frames {
            return Err(ShapeError::OutputTooLong {
                max: self.n * self.n_frames,
                got: v_out.len(),
            });
        }

        self.d_load = Duration::ZERO;
        self.d_decode = Duration::ZERO;
        self.d_store = Duration::ZERO;

        if self.n_dec_waves == 1 && self.n_inter_frame_rest == 0 {
            return self.decode_direct(y_n, v_out, opts);
        }

        let store_mode = if opts.store {
            Some(self.store_mode(v_out.len())?)
        } else {
            None
        };

        let simd = self.simd_inter_frame_level;
        for w in 0..self.n_dec_waves {
            let n_frames_per_wave = if w == self.n_dec_waves - 1 && self.n_inter_frame_rest != 0 {
                self.n_inter_frame_rest
            } else {
                simd
            };

            let t_load = Instant::now();
            if opts.load {
                let off = w * simd * self.n;
                self.y_w[w][..n_frames_per_wave * self.n]
                    .copy_from_slice(&y_n[off..off + n_frames_per_wave * self.n]);
                self.inner.load(&self.y_w[w]);
            }
            self.d_load += t_load.elapsed();

            let t_decode = Instant::now();
            self.inner.decode_wave();
            self.d_decode += t_decode.elapsed();

            let t_store = Instant::now();
            if let Some(mode) = store_mode {
                let fra_size = match mode {
                    StoreMode::Information => self.k,
                    StoreMode::Codeword => self.n,
                };
                if opts.store_fast {
                    self.inner.store_fast(&mut self.v_w[w][..simd * fra_size]);
                    if opts.unpack {
                        self.inner.unpack(&mut self.v_w[w][..simd * fra_size]);
                    }
                } else {
                    match mode {
                        StoreMode::Information => {
                            self.inner.store(&mut self.v_w[w][..simd * self.k])
                        }
                        StoreMode::Codeword => {
                            self.inner.store_cw(&mut self.v_w[w][..simd * self.n])
                        }
                    }
                }
                let off = w * simd * fra_size;
                v_out[off..off + n_frames_per_wave * fra_size]
                    .copy_from_slice(&self.v_w[w][..n_frames_per_wave * fra_size]);
            }
            self.d_store += t_store.elapsed();
        }

        Ok(())
    }

    /// Fast path: one full wave, hooks run on the caller's buffers
    fn decode_direct(
        &mut self,
        y_n: &[Llr],
        v_out: &mut [Bit],
        opts: DecodeOpts,
    ) -> Result<(), ShapeError> {
        let t_load = Instant::now();
        if opts.load {
            self.inner.load(y_n);
        }
        self.d_load += t_load.elapsed();

        let t_decode = Instant::now();
        self.inner.decode_wave();
        self.d_decode += t_decode.elapsed();

        let t_store = Instant::now();
        if opts.store {
            if opts.store_fast {
                self.inner.store_fast(v_out);
                if opts.unpack {
                    self.inner.unpack(v_out);
                }
            } else {
                match self.store_mode(v_out.len())? {
                    StoreMode::Information => self.inner.store(v_out),
                    StoreMode::Codeword => self.inner.store_cw(v_out),
                }
            }
        }
        self.d_store += t_store.elapsed();

        Ok(())
    }

    fn store_mode(&self, v_len: usize) -> Result<StoreMode, ShapeError> {
        if v_len == self.k * self.n_frames {
            Ok(StoreMode::Information)
        } else if v_len == self.n * self.n_frames {
            Ok(StoreMode::Codeword)
        } else {
            Err(ShapeError::OutputShape {
                got: v_len,
                info_len: self.k * self.n_frames,
                codeword_len: self.n * self.n_frames,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test wave primitive: hard-decides the wave's LLRs, treating the
    /// first K positions of each frame as the information bits.
    struct Threshold {
        k: usize,
        n: usize,
        simd: usize,
        y: Vec<Llr>,
    }

    impl Threshold {
        fn new(k: usize, n: usize, simd: usize) -> Self {
            Self {
                k,
                n,
                simd,
                y: vec![0.0; simd * n],
            }
        }
    }

    impl WaveDecoder for Threshold {
        fn k(&self) -> usize {
            self.k
        }
        fn n(&self) -> usize {
            self.n
        }
        fn simd_inter_frame_level(&self) -> usize {
            self.simd
        }
        fn load(&mut self, y_n: &[Llr]) {
            self.y.copy_from_slice(y_n);
        }
        fn decode_wave(&mut self) {}
        fn store(&mut self, v_k: &mut [Bit]) {
            for f in 0..self.simd {
                for i in 0..self.k {
                    v_k[f * self.k + i] = (self.y[f * self.n + i] < 0.0) as Bit;
                }
            }
        }
        fn store_cw(&mut self, v_n: &mut [Bit]) {
            for (v, y) in v_n.iter_mut().zip(&self.y) {
                *v = (*y < 0.0) as Bit;
            }
        }
    }

    fn llrs(bits: &[Bit]) -> Vec<Llr> {
        bits.iter().map(|&b| if b == 0 { 5.0 } else { -5.0 }).collect()
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            BatchDecoder::new(1, Threshold::new(0, 4, 1)),
            Err(ConstructionError::Zero { what: "K" })
        ));
        assert!(matches!(
            BatchDecoder::new(0, Threshold::new(2, 4, 1)),
            Err(ConstructionError::Zero { what: "n_frames" })
        ));
        assert!(matches!(
            BatchDecoder::new(1, Threshold::new(2, 4, 0)),
            Err(ConstructionError::Zero { .. })
        ));
    }

    #[test]
    fn test_k_larger_than_n_rejected() {
        assert!(matches!(
            BatchDecoder::new(1, Threshold::new(5, 4, 1)),
            Err(ConstructionError::KLargerThanN { k: 5, n: 4 })
        ));
    }

    #[test]
    fn test_wave_math() {
        let dec = BatchDecoder::new(5, Threshold::new(2, 4, 2)).unwrap();
        assert_eq!(dec.n_dec_waves(), 3);
        assert_eq!(dec.n_inter_frame_rest(), 1);

        let dec = BatchDecoder::new(4, Threshold::new(2, 4, 2)).unwrap();
        assert_eq!(dec.n_dec_waves(), 2);
        assert_eq!(dec.n_inter_frame_rest(), 0);
    }

    #[test]
    fn test_input_length_checked() {
        let mut dec = BatchDecoder::new(2, Threshold::new(2, 4, 1)).unwrap();
        let mut v = vec![0; 4];
        assert!(matches!(
            dec.decode(&[0.0; 7], &mut v),
            Err(ShapeError::InputLength { expected: 8, got: 7 })
        ));
    }

    #[test]
    fn test_output_too_long_checked() {
        let mut dec = BatchDecoder::new(2, Threshold::new(2, 4, 1)).unwrap();
        let mut v = vec![0; 9];
        assert!(matches!(
            dec.decode(&[0.0; 8], &mut v),
            Err(ShapeError::OutputTooLong { max: 8, got: 9 })
        ));
    }

    #[test]
    fn test_output_shape_checked() {
        // 3 frames, simd 2: general path; v_out matches neither 6 (K) nor 12 (N)
        let mut dec = BatchDecoder::new(3, Threshold::new(2, 4, 2)).unwrap();
        let y = vec![1.0; 12];
        let mut v = vec![0; 7];
        assert!(matches!(
            dec.decode(&y, &mut v),
            Err(ShapeError::OutputShape { got: 7, .. })
        ));
    }

    #[test]
    fn test_store_disabled_skips_shape_check_and_output() {
        let mut dec = BatchDecoder::new(3, Threshold::new(2, 4, 2)).unwrap();
        let y = vec![-1.0; 12];
        let mut v = vec![9; 7];
        dec.decode_with(
            &y,
            &mut v,
            DecodeOpts {
                store: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(v, vec![9; 7], "output must be untouched when store is off");
    }

    #[test]
    fn test_batched_equals_frame_by_frame() {
        // 5 frames, simd 2: 3 waves, the last wave holds a single frame
        let frames: Vec<Vec<Bit>> = vec![
            vec![1, 0, 1, 1],
            vec![0, 0, 0, 1],
            vec![1, 1, 1, 1],
            vec![0, 1, 0, 0],
            vec![1, 0, 0, 0],
        ];
        let y: Vec<Llr> = frames.iter().flat_map(|f| llrs(f)).collect();

        let mut batched = BatchDecoder::new(5, Threshold::new(2, 4, 2)).unwrap();
        let mut v_all = vec![0; 2 * 5];
        batched.decode(&y, &mut v_all).unwrap();

        let mut single = BatchDecoder::new(1, Threshold::new(2, 4, 1)).unwrap();
        for (f, frame) in frames.iter().enumerate() {
            let mut v = vec![0; 2];
            single.decode(&llrs(frame), &mut v).unwrap();
            assert_eq!(
                &v_all[f * 2..(f + 1) * 2],
                v.as_slice(),
                "frame {f} differs between batched and single-frame decode"
            );
        }
    }

    #[test]
    fn test_codeword_store_by_output_length() {
        let frame = vec![1, 0, 1, 1];
        let y = llrs(&frame);
        let mut dec = BatchDecoder::new(1, Threshold::new(2, 4, 1)).unwrap();

        let mut v_n = vec![0; 4];
        dec.decode(&y, &mut v_n).unwrap();
        assert_eq!(v_n, frame);

        let mut v_k = vec![0; 2];
        dec.decode(&y, &mut v_k).unwrap();
        assert_eq!(v_k, frame[..2]);
    }

    #[test]
    fn test_fast_path_matches_general_path() {
        let frames = [vec![1, 0, 1, 0], vec![0, 1, 1, 1]];
        let y: Vec<Llr> = frames.iter().flat_map(|f| llrs(f)).collect();

        // simd 2 over 2 frames: single full wave, fast path
        let mut fast = BatchDecoder::new(2, Threshold::new(2, 4, 2)).unwrap();
        let mut v_fast = vec![0; 4];
        fast.decode(&y, &mut v_fast).unwrap();

        // simd 1 over 2 frames: general path, two waves
        let mut staged = BatchDecoder::new(2, Threshold::new(2, 4, 1)).unwrap();
        let mut v_staged = vec![0; 4];
        staged.decode(&y, &mut v_staged).unwrap();

        assert_eq!(v_fast, v_staged);
    }

    #[test]
    fn test_store_fast_defaults_to_canonical_store() {
        let frame = vec![1, 0, 1, 1];
        let y = llrs(&frame);
        let mut dec = BatchDecoder::new(1, Threshold::new(2, 4, 1)).unwrap();

        let mut v_plain = vec![0; 2];
        dec.decode(&y, &mut v_plain).unwrap();

        let mut v_fast = vec![0; 2];
        dec.decode_with(
            &y,
            &mut v_fast,
            DecodeOpts {
                store_fast: true,
                unpack: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(v_plain, v_fast);
    }

    /// Wave primitive with a switchable decode delay, to observe the
    /// per-call reset of the phase accumulators.
    struct Sleepy {
        inner: Threshold,
        sleep: bool,
    }

    impl WaveDecoder for Sleepy {
        fn k(&self) -> usize {
            self.inner.k()
        }
        fn n(&self) -> usize {
            self.inner.n()
        }
        fn simd_inter_frame_level(&self) -> usize {
            self.inner.simd_inter_frame_level()
        }
        fn load(&mut self, y_n: &[Llr]) {
            self.inner.load(y_n);
        }
        fn decode_wave(&mut self) {
            if self.sleep {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        fn store(&mut self, v_k: &mut [Bit]) {
            self.inner.store(v_k);
        }
        fn store_cw(&mut self, v_n: &mut [Bit]) {
            self.inner.store_cw(v_n);
        }
    }

    #[test]
    fn test_phase_durations_reset_per_call() {
        let sleepy = Sleepy {
            inner: Threshold::new(2, 4, 2),
            sleep: true,
        };
        let mut dec = BatchDecoder::new(5, sleepy).unwrap();
        let y = vec![1.0; 20];
        let mut v = vec![0; 10];

        // 3 waves of >= 5 ms each
        dec.decode(&y, &mut v).unwrap();
        assert!(dec.decode_duration() >= Duration::from_millis(15));

        // a fast second call must not inherit the first call's durations
        dec.inner_mut().sleep = false;
        dec.decode(&y, &mut v).unwrap();
        assert!(
            dec.decode_duration() < Duration::from_millis(15),
            "decode duration {:?} looks cumulative across calls",
            dec.decode_duration()
        );
    }
}
