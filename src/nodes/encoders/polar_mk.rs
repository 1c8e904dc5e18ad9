//! Generalized multi-kernel polar encoder
//!
//! Encoding scatters the K information bits into the N-vector (frozen lanes
//! carry zero) and applies the kernel transform recursively, smallest
//! blocks first. The transform uses the same strided index map as the SC
//! decoder's re-encode pass, so an encoded frame equals the decoder's root
//! partial sums for the same leaf decisions.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::code::{ConstructionError, PolarCode};
use crate::nodes::ShapeError;
use crate::runtime::Module;
use crate::Bit;

/// Single-frame multi-kernel polar encode primitive
pub struct PolarMkEncoder {
    k: usize,
    n: usize,
    code: PolarCode,
    frozen_bits: Vec<bool>,
    /// Transposed kernel tables, one row-major `size*size` table per kernel
    ke: Vec<Vec<Bit>>,
}

impl PolarMkEncoder {
    /// Build an encoder for a mono-kernel code
    pub fn new(
        k: usize,
        n: usize,
        code: &PolarCode,
        frozen_bits: &[bool],
    ) -> Result<Self, ConstructionError> {
        if k == 0 {
            return Err(ConstructionError::Zero { what: "K" });
        }
        if n == 0 {
            return Err(ConstructionError::Zero { what: "N" });
        }
        if k > n {
            return Err(ConstructionError::KLargerThanN { k, n });
        }
        if !code.is_mono_kernel() {
            return Err(ConstructionError::MultiKernel);
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

        let ke = code
            .kernel_matrices()
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
            .collect();

        Ok(Self {
            k,
            n,
            code: code.clone(),
            frozen_bits: frozen_bits.to_vec(),
            ke,
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

    /// The active frozen-bit mask
    pub fn frozen_bits(&self) -> &[bool] {
        &self.frozen_bits
    }

    /// Encode one frame: `u_k` holds K information bits, `x_n` receives
    /// the N-bit codeword
    pub fn encode(&self, u_k: &[Bit], x_n: &mut [Bit]) -> Result<(), ShapeError> {
        if u_k.len() != self.k {
            return Err(ShapeError::InputLength {
                expected: self.k,
                got: u_k.len(),
            });
        }
        if x_n.len() != self.n {
            return Err(ShapeError::OutputLength {
                expected: self.n,
                got: x_n.len(),
            });
        }

        // frozen lanes carry zero, information lanes take u_k in order
        let mut kk = 0;
        for lane in 0..self.n {
            x_n[lane] = if self.frozen_bits[lane] {
                0
            } else {
                let bit = u_k[kk] & 1;
                kk += 1;
                bit
            };
        }

        self.transform(x_n, 0, self.n, self.code.n_stages());
        Ok(())
    }

    /// In-place kernel transform of `x[offset..offset+size]`, children
    /// first, then one kernel repetition per stride position
    fn transform(&self, x: &mut [Bit], offset: usize, size: usize, stage: usize) {
        if size == 1 {
            return;
        }

        let kidx = self.code.stages()[stage - 1];
        let kern_size = self.code.kernel_matrices()[kidx].len();
        let sub_part = size / kern_size;

        for child in 0..kern_size {
            self.transform(x, offset + child * sub_part, sub_part, stage - 1);
        }

        let ke = &self.ke[kidx];
        let mut u = vec![0; kern_size];
        for k_rep in 0..sub_part {
            for (i, u_i) in u.iter_mut().enumerate() {
                *u_i = x[offset + i * sub_part + k_rep];
            }
            for i in 0..kern_size {
                let mut sum = 0;
                for j in 0..kern_size {
                    sum ^= u[j] & ke[i * kern_size + j];
                }
                x[offset + i * sub_part + k_rep] = sum;
            }
        }
    }
}

/// Module wrapper exposing the encoder through the port framework.
///
/// One task is published: `encode` (sockets `U_K` in, `X_N` out), looping
/// over the module's frames.
pub struct PolarEncoder {
    module: Module,
    core: Rc<RefCell<PolarMkEncoder>>,
}

impl PolarEncoder {
    /// Build the encoder stage for `n_frames` frames per call
    pub fn new(
        k: usize,
        n: usize,
        code: &PolarCode,
        frozen_bits: &[bool],
        n_frames: usize,
    ) -> Result<Self, ConstructionError> {
        if n_frames == 0 {
            return Err(ConstructionError::Zero { what: "n_frames" });
        }
        let core = Rc::new(RefCell::new(PolarMkEncoder::new(k, n, code, frozen_bits)?));
        let mut module = Module::new("polar_encoder", n_frames);

        let task = module.add_task("encode").expect("fresh module");
        task.create_input_socket::<Bit>("U_K", k * n_frames)
            .expect("socket names are unique");
        task.create_output_socket::<Bit>("X_N", n * n_frames)
            .expect("socket names are unique");

        {
            let core = Rc::clone(&core);
            let mut u_buf = vec![0; k * n_frames];
            let mut x_buf = vec![0; n * n_frames];
            task.bind_codelet(Box::new(move |io, _phases| {
                u_buf.copy_from_slice(&io.read::<Bit>("U_K")?);
                let enc = core.borrow();
                for f in 0..n_frames {
                    enc.encode(&u_buf[f * k..(f + 1) * k], &mut x_buf[f * n..(f + 1) * n])?;
                }
                drop(enc);
                io.write::<Bit>("X_N")?.copy_from_slice(&x_buf);
                Ok(n_frames)
            }));
        }

        debug!(k, n, n_frames, "polar encoder stage ready");
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

    /// Encode outside the task path (same core, same mask)
    pub fn encode(&self, u_k: &[Bit], x_n: &mut [Bit]) -> Result<(), ShapeError> {
        self.core.borrow().encode(u_k, x_n)
    }
}
