//! Generalized multi-kernel successive-cancellation polar decoder
//!
//! Decoding walks a full arity-ary tree whose root covers the whole
//! codeword and whose leaves are the N symbol positions. At each internal
//! node the parent's LLR vector is combined into one child LLR vector at a
//! time (conditioned on the hard bits of the children already decided),
//! depth-first and left to right; once every child is decided, the node
//! re-encodes its partial sums through the kernel's generator. Leaves make
//! the hard decision, with frozen lanes forced to zero.
//!
//! The decoder is "naive" SC: one pass, no lists, no backtracking. A
//! wrong early decision propagates to the rest of the block.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use tracing::debug;

use super::batch::BatchDecoder;
use super::WaveDecoder;
use crate::code::{
    kernel_arikan, kernel_ternary_a, kernel_ternary_b, ConstructionError, KernelMatrix, PolarCode,
};
use crate::runtime::Module;
use crate::tree::{NodeId, Tree};
use crate::{Bit, Llr};

/// Combine function of one child position: `(parent LLRs, decided bits of
/// the preceding children) -> child LLR`
type CombineFn = fn(&[Llr], &[Bit]) -> Llr;

/// Per-node decode state
#[derive(Debug)]
struct ScContents {
    /// Propagated LLRs, one per position covered by the node
    l: Vec<Llr>,
    /// Re-encoded partial sums, same width
    s: Vec<Bit>,
    /// Distance from the leaves (root carries the highest stage)
    stage: usize,
    /// Frozen-lane flag, meaningful for leaves only
    frozen: bool,
}

impl ScContents {
    fn new(size: usize, stage: usize) -> Self {
        Self {
            l: vec![0.0; size],
            s: vec![0; size],
            stage,
            frozen: false,
        }
    }
}

// min-sum check-node update: XORed signs applied to the smallest magnitude
fn lambda_arikan_0(l: &[Llr], _bits: &[Bit]) -> Llr {
    let sign = l[0].is_sign_negative() ^ l[1].is_sign_negative();
    let min = l[0].abs().min(l[1].abs());
    if sign {
        -min
    } else {
        min
    }
}

// bit-node update conditioned on the already-decided first child
fn lambda_arikan_1(l: &[Llr], bits: &[Bit]) -> Llr {
    (if bits[0] == 0 { l[0] } else { -l[0] }) + l[1]
}

fn lambda_ternary_min3(l: &[Llr], _bits: &[Bit]) -> Llr {
    let sign =
        l[0].is_sign_negative() ^ l[1].is_sign_negative() ^ l[2].is_sign_negative();
    let min = l[0].abs().min(l[1].abs()).min(l[2].abs());
    if sign {
        -min
    } else {
        min
    }
}

fn lambda_ternary_a_1(l: &[Llr], bits: &[Bit]) -> Llr {
    let sign = l[1].is_sign_negative() ^ l[2].is_sign_negative();
    let min = l[1].abs().min(l[2].abs());
    let l1_l2 = if sign { -min } else { min };

    (if bits[0] == 0 { l[0] } else { -l[0] }) + l1_l2
}

fn lambda_ternary_a_2(l: &[Llr], bits: &[Bit]) -> Llr {
    (if bits[0] == 0 { l[1] } else { -l[1] })
        + (if bits[0] ^ bits[1] == 0 { l[2] } else { -l[2] })
}

fn lambda_ternary_b_1(l: &[Llr], bits: &[Bit]) -> Llr {
    let hl0 = if bits[0] == 0 { l[0] } else { -l[0] };

    let sign = hl0.is_sign_negative() ^ l[2].is_sign_negative();
    let min = hl0.abs().min(l[2].abs());
    let hl0_l2 = if sign { -min } else { min };

    hl0_l2 + l[1]
}

fn lambda_ternary_b_2(l: &[Llr], bits: &[Bit]) -> Llr {
    let hl0 = if bits[0] ^ bits[1] == 0 { l[0] } else { -l[0] };

    hl0 + l[2]
}

/// Map a kernel matrix to its fixed set of combine functions, one per
/// child position
fn recognize_kernel(kernel: &KernelMatrix) -> Option<Vec<CombineFn>> {
    if *kernel == kernel_arikan() {
        Some(vec![lambda_arikan_0, lambda_arikan_1])
    } else if *kernel == kernel_ternary_a() {
        Some(vec![
            lambda_ternary_min3,
            lambda_ternary_a_1,
            lambda_ternary_a_2,
        ])
    } else if *kernel == kernel_ternary_b() {
        Some(vec![
            lambda_ternary_min3,
            lambda_ternary_b_1,
            lambda_ternary_b_2,
        ])
    } else {
        None
    }
}

/// Single-wave multi-kernel SC decode primitive
pub struct PolarMkScDecoder {
    k: usize,
    n: usize,
    simd_inter_frame_level: usize,
    code: PolarCode,
    frozen_bits: Vec<bool>,
    tree: Tree<ScContents>,
    /// Transposed kernel tables, one row-major `size*size` table per kernel
    ke: Vec<Vec<Bit>>,
    lambdas: Vec<CombineFn>,
    llrs: Vec<Llr>,
    bits: Vec<Bit>,
    enc_u: Vec<Bit>,
    enc_idx: Vec<usize>,
    wave_y: Vec<Llr>,
    wave_v_k: Vec<Bit>,
    wave_v_n: Vec<Bit>,
}

impl PolarMkScDecoder {
    /// Build a decoder for a mono-kernel code with a recognized kernel.
    ///
    /// Validation is fail-fast and runs before any tree allocation, so an
    /// unsupported code never leaves a partially built decoder behind.
    pub fn new(
        k: usize,
        n: usize,
        code: &PolarCode,
        frozen_bits: &[bool],
        simd_inter_frame_level: usize,
    ) -> Result<Self, ConstructionError> {
        if k == 0 {
            return Err(ConstructionError::Zero { what: "K" });
        }
        if n == 0 {
            return Err(ConstructionError::Zero { what: "N" });
        }
        if simd_inter_frame_level == 0 {
            return Err(ConstructionError::Zero {
                what: "simd_inter_frame_level",
            });
        }
        if k > n {
            return Err(ConstructionError::KLargerThanN { k, n });
        }
        if !code.is_mono_kernel() {
            return Err(ConstructionError::MultiKernel);
        }
        let base = code.kernel_matrices()[0].len();
        if base < 2 {
            return Err(ConstructionError::KernelTooSmall { size: base });
        }
        if n != code.codeword_size() {
            return Err(ConstructionError::CodewordSizeMismatch {
                n,
                codeword_size: code.codeword_size(),
            });
        }
        if frozen_bits.len() != n {
            return Err(ConstructionError::FrozenMaskLength {
                expected: n,
                got: frozen_bits.len(),
            });
        }
        let info = frozen_bits.iter().filter(|&&frozen| !frozen).count();
        if info != k {
            return Err(ConstructionError::FrozenCountMismatch { k, got: info });
        }
        let lambdas = recognize_kernel(&code.kernel_matrices()[0])
            .ok_or(ConstructionError::UnsupportedKernel)?;

        let ke = transpose_kernels(code);
        let n_stages = code.n_stages();
        let tree = Tree::new(n_stages + 1, base, |depth, _is_leaf| {
            ScContents::new(n / base.pow(depth as u32), n_stages - depth)
        });
        let biggest = code.biggest_kernel_size();

        let mut decoder = Self {
            k,
            n,
            simd_inter_frame_level,
            code: code.clone(),
            frozen_bits: frozen_bits.to_vec(),
            tree,
            ke,
            lambdas,
            llrs: vec![0.0; base],
            bits: vec![0; base - 1],
            enc_u: vec![0; biggest],
            enc_idx: vec![0; biggest],
            wave_y: vec![0.0; simd_inter_frame_level * n],
            wave_v_k: vec![0; simd_inter_frame_level * k],
            wave_v_n: vec![0; simd_inter_frame_level * n],
        };
        decoder.init_frozen_bits();

        debug!(k, n, base, n_stages, "polar SC decode tree built");
        Ok(decoder)
    }

    /// The code description this decoder was built for
    pub fn code(&self) -> &PolarCode {
        &self.code
    }

    /// The active frozen-bit mask
    pub fn frozen_bits(&self) -> &[bool] {
        &self.frozen_bits
    }

    /// Apply an updated frozen-bit mask in place, without rebuilding the
    /// tree. The new mask must keep N and K unchanged.
    pub fn set_frozen_bits(&mut self, frozen_bits: &[bool]) -> Result<(), ConstructionError> {
        if frozen_bits.len() != self.n {
            return Err(ConstructionError::FrozenMaskLength {
                expected: self.n,
                got: frozen_bits.len(),
            });
        }
        let info = frozen_bits.iter().filter(|&&frozen| !frozen).count();
        if info != self.k {
            return Err(ConstructionError::FrozenCountMismatch {
                k: self.k,
                got: info,
            });
        }
        self.frozen_bits.copy_from_slice(frozen_bits);
        self.init_frozen_bits();
        Ok(())
    }

    /// Copy the mask into the leaves, lane by lane
    fn init_frozen_bits(&mut self) {
        for lane in 0..self.n {
            let leaf = self.tree.leaves()[lane];
            self.tree.content_mut(leaf).frozen = self.frozen_bits[lane];
        }
    }

    fn recursive_decode(&mut self, node_id: NodeId) {
        if self.tree.is_leaf(node_id) {
            let contents = self.tree.content_mut(node_id);
            contents.s[0] = (!contents.frozen && contents.l[0] < 0.0) as Bit;
            return;
        }

        let kern_size = self.tree.children(node_id).len();
        let size = self.tree.content(node_id).l.len();
        let sub_part = size / kern_size;

        for child in 0..kern_size {
            let child_id = self.tree.children(node_id)[child];

            for i in 0..sub_part {
                for l in 0..kern_size {
                    self.llrs[l] = self.tree.content(node_id).l[l * sub_part + i];
                }
                for c in 0..child {
                    let cid = self.tree.children(node_id)[c];
                    self.bits[c] = self.tree.content(cid).s[i];
                }
                let lambda = self.lambdas[child];
                let val = lambda(&self.llrs, &self.bits);
                self.tree.content_mut(child_id).l[i] = val;
            }

            self.recursive_decode(child_id);
        }

        // re-encode the partial sums through the kernel generator, one
        // kernel repetition at a time
        let stage = self.tree.content(node_id).stage;
        let kidx = self.code.stages()[stage - 1];
        let n_kernels = size / kern_size;
        for k_rep in 0..n_kernels {
            for i in 0..kern_size {
                let pos = n_kernels * i + k_rep;
                self.enc_idx[i] = pos;
                let cid = self.tree.children(node_id)[pos / sub_part];
                self.enc_u[i] = self.tree.content(cid).s[pos % sub_part];
            }
            for i in 0..kern_size {
                let mut sum = 0;
                for j in 0..kern_size {
                    sum ^= self.enc_u[j] & self.ke[kidx][i * kern_size + j];
                }
                let pos = self.enc_idx[i];
                self.tree.content_mut(node_id).s[pos] = sum;
            }
        }
    }
}

/// Store every kernel transposed, row-major: `ke[i*size + j] = kernel[j][i]`
fn transpose_kernels(code: &PolarCode) -> Vec<Vec<Bit>> {
    code.kernel_matrices()
        .iter()
        .map(|kernel| {
            let size = kernel.len();
            let mut table = vec![0; size * size];
            for i in 0..size {
                for j in 0..size {
                    table[i * size + j] = kernel[j][i] as Bit;
                }
            }
            table
        })
        .collect()
}

impl WaveDecoder for PolarMkScDecoder {
    fn k(&self) -> usize {
        self.k
    }

    fn n(&self) -> usize {
        self.n
    }

    fn simd_inter_frame_level(&self) -> usize {
        self.simd_inter_frame_level
    }

    fn load(&mut self, y_n: &[Llr]) {
        self.wave_y.copy_from_slice(y_n);
    }

    fn decode_wave(&mut self) {
        let root = self.tree.root();
        for f in 0..self.simd_inter_frame_level {
            let off = f * self.n;
            self.tree
                .content_mut(root)
                .l
                .copy_from_slice(&self.wave_y[off..off + self.n]);

            self.recursive_decode(root);

            // information bits: non-frozen leaves in lane order
            let mut kk = 0;
            for lane in 0..self.n {
                if self.frozen_bits[lane] {
                    continue;
                }
                let leaf = self.tree.leaves()[lane];
                self.wave_v_k[f * self.k + kk] = self.tree.content(leaf).s[0];
                kk += 1;
            }

            // full codeword: the root partial sums are already the
            // re-encoded frame
            self.wave_v_n[off..off + self.n]
                .copy_from_slice(&self.tree.content(root).s);
        }
    }

    fn store(&mut self, v_k: &mut [Bit]) {
        v_k.copy_from_slice(&self.wave_v_k);
    }

    fn store_cw(&mut self, v_n: &mut [Bit]) {
        v_n.copy_from_slice(&self.wave_v_n);
    }
}

/// Module wrapper exposing the decoder through the port framework.
///
/// Two tasks are published: `decode_siho` (sockets `Y_N` in, `V_K` out)
/// and `decode_siho_cw` (sockets `Y_N` in, `V_N` out). Both report their
/// load/decode/store timings into the task's phase timers.
pub struct PolarDecoder {
    module: Module,
    core: Rc<RefCell<BatchDecoder<PolarMkScDecoder>>>,
}

impl PolarDecoder {
    /// Build the decoder stage for `n_frames` frames per call
    pub fn new(
        k: usize,
        n: usize,
        code: &PolarCode,
        frozen_bits: &[bool],
        n_frames: usize,
        simd_inter_frame_level: usize,
    ) -> Result<Self, ConstructionError> {
        let inner = PolarMkScDecoder::new(k, n, code, frozen_bits, simd_inter_frame_level)?;
        let core = Rc::new(RefCell::new(BatchDecoder::new(n_frames, inner)?));
        let mut module = Module::new("polar_sc_decoder", n_frames);

        {
            let task = module.add_task("decode_siho").expect("fresh module");
            task.create_input_socket::<Llr>("Y_N", n * n_frames)
                .expect("socket names are unique");
            task.create_output_socket::<Bit>("V_K", k * n_frames)
                .expect("socket names are unique");
            task.register_phase("load");
            task.register_phase("decode");
            task.register_phase("store");

            let core = Rc::clone(&core);
            let mut y_buf = vec![0.0; n * n_frames];
            let mut v_buf = vec![0; k * n_frames];
            task.bind_codelet(Box::new(move |io, phases| {
                y_buf.copy_from_slice(&io.read::<Llr>("Y_N")?);
                let mut dec = core.borrow_mut();
                dec.decode(&y_buf, &mut v_buf)?;
                phases.update("load", dec.load_duration());
                phases.update("decode", dec.decode_duration());
                phases.update("store", dec.store_duration());
                drop(dec);
                io.write::<Bit>("V_K")?.copy_from_slice(&v_buf);
                Ok(n_frames)
            }));
        }

        {
            let task = module.add_task("decode_siho_cw").expect("fresh module");
            task.create_input_socket::<Llr>("Y_N", n * n_frames)
                .expect("socket names are unique");
            task.create_output_socket::<Bit>("V_N", n * n_frames)
                .expect("socket names are unique");
            task.register_phase("load");
            task.register_phase("decode");
            task.register_phase("store");

            let core = Rc::clone(&core);
            let mut y_buf = vec![0.0; n * n_frames];
            let mut v_buf = vec![0; n * n_frames];
            task.bind_codelet(Box::new(move |io, phases| {
                y_buf.copy_from_slice(&io.read::<Llr>("Y_N")?);
                let mut dec = core.borrow_mut();
                dec.decode(&y_buf, &mut v_buf)?;
                phases.update("load", dec.load_duration());
                phases.update("decode", dec.decode_duration());
                phases.update("store", dec.store_duration());
                drop(dec);
                io.write::<Bit>("V_N")?.copy_from_slice(&v_buf);
                Ok(n_frames)
            }));
        }

        Ok(Self { module, core })
    }

    /// The stage's module
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Mutable access to the stage's module, for binding and execution
    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    /// Read access to the wrapped batch decoder
    pub fn batch(&self) -> Ref<'_, BatchDecoder<PolarMkScDecoder>> {
        self.core.borrow()
    }

    /// Refresh the frozen-bit mask for subsequent calls
    pub fn set_frozen_bits(&self, frozen_bits: &[bool]) -> Result<(), ConstructionError> {
        self.core
            .borrow_mut()
            .inner_mut()
            .set_frozen_bits(frozen_bits)
    }
}
