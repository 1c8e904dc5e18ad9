//! Polar code descriptions
//!
//! A [`PolarCode`] describes how a codeword of length N factors into a
//! recursive composition of small binary kernels: one square kernel matrix
//! per registered kernel, plus a per-stage assignment picking the kernel
//! used at each level of the factorization. The codeword length is the
//! product of the assigned kernel sizes.
//!
//! Codecs consume this description; they run their own checks on top (e.g.
//! the SC decoder requires a mono-kernel code with a recognized kernel).

/// A square binary kernel matrix, rows in generator orientation
pub type KernelMatrix = Vec<Vec<bool>>;

/// Errors raised while constructing codes, codecs or batch drivers.
///
/// Construction is fail-fast: on error no partially usable object is
/// returned.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("'{what}' has to be greater than 0")]
    Zero { what: &'static str },

    #[error("'K' has to be smaller than or equal to 'N' ('K' = {k}, 'N' = {n})")]
    KLargerThanN { k: usize, n: usize },

    #[error("the code needs at least one kernel matrix")]
    EmptyKernelSet,

    #[error("kernel {index} is not square ({rows} rows, row {bad_row} has {bad_len} columns)")]
    NonSquareKernel {
        index: usize,
        rows: usize,
        bad_row: usize,
        bad_len: usize,
    },

    #[error("the kernel dimension has to be at least 2 (got {size})")]
    KernelTooSmall { size: usize },

    #[error("the code needs at least one stage")]
    EmptyStageMap,

    #[error("stage {stage} refers to kernel {index}, but only {n_kernels} kernels are registered")]
    BadStageIndex {
        stage: usize,
        index: usize,
        n_kernels: usize,
    },

    #[error("'N' has to be equal to the code's codeword size ('N' = {n}, codeword size = {codeword_size})")]
    CodewordSizeMismatch { n: usize, codeword_size: usize },

    #[error("the frozen-bit mask length has to be equal to 'N' (mask length = {got}, 'N' = {expected})")]
    FrozenMaskLength { expected: usize, got: usize },

    #[error("the number of information bits in the frozen-bit mask is invalid ('K' = {k}, non-frozen = {got})")]
    FrozenCountMismatch { k: usize, got: usize },

    #[error("the code has to be mono-kernel")]
    MultiKernel,

    #[error("unsupported polar kernel")]
    UnsupportedKernel,
}

/// Kernel matrices plus a per-stage kernel assignment
#[derive(Debug, Clone)]
pub struct PolarCode {
    kernel_matrices: Vec<KernelMatrix>,
    stages: Vec<usize>,
    codeword_size: usize,
}

impl PolarCode {
    /// Build a code from its kernel matrices and stage assignment.
    ///
    /// `stages[s]` is the kernel index used at stage `s`, stage 0 being the
    /// leaf-most level. The codeword size is the product of the assigned
    /// kernel sizes.
    pub fn new(
        kernel_matrices: Vec<KernelMatrix>,
        stages: Vec<usize>,
    ) -> Result<Self, ConstructionError> {
        if kernel_matrices.is_empty() {
            return Err(ConstructionError::EmptyKernelSet);
        }
        for (index, kernel) in kernel_matrices.iter().enumerate() {
            let rows = kernel.len();
            if rows < 2 {
                return Err(ConstructionError::KernelTooSmall { size: rows });
            }
            for (bad_row, row) in kernel.iter().enumerate() {
                if row.len() != rows {
                    return Err(ConstructionError::NonSquareKernel {
                        index,
                        rows,
                        bad_row,
                        bad_len: row.len(),
                    });
                }
            }
        }
        if stages.is_empty() {
            return Err(ConstructionError::EmptyStageMap);
        }
        for (stage, &index) in stages.iter().enumerate() {
            if index >= kernel_matrices.len() {
                return Err(ConstructionError::BadStageIndex {
                    stage,
                    index,
                    n_kernels: kernel_matrices.len(),
                });
            }
        }

        let codeword_size = stages
            .iter()
            .map(|&index| kernel_matrices[index].len())
            .product();

        Ok(Self {
            kernel_matrices,
            stages,
            codeword_size,
        })
    }

    /// Build a mono-kernel code: one kernel reused at every one of
    /// `n_stages` stages
    pub fn mono(kernel: KernelMatrix, n_stages: usize) -> Result<Self, ConstructionError> {
        if n_stages == 0 {
            return Err(ConstructionError::EmptyStageMap);
        }
        Self::new(vec![kernel], vec![0; n_stages])
    }

    /// The registered kernel matrices
    pub fn kernel_matrices(&self) -> &[KernelMatrix] {
        &self.kernel_matrices
    }

    /// Per-stage kernel indices, stage 0 leaf-most
    pub fn stages(&self) -> &[usize] {
        &self.stages
    }

    /// Number of composition stages
    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    /// Codeword length N implied by the stage assignment
    pub fn codeword_size(&self) -> usize {
        self.codeword_size
    }

    /// True when a single kernel is used throughout
    pub fn is_mono_kernel(&self) -> bool {
        self.kernel_matrices.len() == 1
    }

    /// Size of the largest registered kernel
    pub fn biggest_kernel_size(&self) -> usize {
        self.kernel_matrices
            .iter()
            .map(|k| k.len())
            .max()
            .unwrap_or(0)
    }
}

/// The classical 2×2 Arikan (butterfly) kernel `[[1,0],[1,1]]`
pub fn kernel_arikan() -> KernelMatrix {
    vec![vec![true, false], vec![true, true]]
}

/// The 3×3 kernel `[[1,1,1],[1,0,1],[0,1,1]]`
pub fn kernel_ternary_a() -> KernelMatrix {
    vec![
        vec![true, true, true],
        vec![true, false, true],
        vec![false, true, true],
    ]
}

/// The 3×3 kernel `[[1,0,0],[1,1,0],[1,0,1]]`
pub fn kernel_ternary_b() -> KernelMatrix {
    vec![
        vec![true, false, false],
        vec![true, true, false],
        vec![true, false, true],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_code_codeword_size() {
        let code = PolarCode::mono(kernel_arikan(), 3).unwrap();
        assert_eq!(code.codeword_size(), 8);
        assert_eq!(code.n_stages(), 3);
        assert!(code.is_mono_kernel());
        assert_eq!(code.biggest_kernel_size(), 2);
    }

    #[test]
    fn test_ternary_codeword_size() {
        let code = PolarCode::mono(kernel_ternary_a(), 2).unwrap();
        assert_eq!(code.codeword_size(), 9);
    }

    #[test]
    fn test_mixed_kernels_are_not_mono() {
        let code = PolarCode::new(
            vec![kernel_arikan(), kernel_ternary_a()],
            vec![0, 1],
        )
        .unwrap();
        assert!(!code.is_mono_kernel());
        assert_eq!(code.codeword_size(), 6);
        assert_eq!(code.biggest_kernel_size(), 3);
    }

    #[test]
    fn test_non_square_kernel_rejected() {
        let bad = vec![vec![true, false], vec![true]];
        assert!(matches!(
            PolarCode::mono(bad, 2),
            Err(ConstructionError::NonSquareKernel { .. })
        ));
    }

    #[test]
    fn test_tiny_kernel_rejected() {
        let bad = vec![vec![true]];
        assert!(matches!(
            PolarCode::mono(bad, 2),
            Err(ConstructionError::KernelTooSmall { size: 1 })
        ));
    }

    #[test]
    fn test_empty_stage_map_rejected() {
        assert!(matches!(
            PolarCode::mono(kernel_arikan(), 0),
            Err(ConstructionError::EmptyStageMap)
        ));
        assert!(matches!(
            PolarCode::new(vec![kernel_arikan()], vec![]),
            Err(ConstructionError::EmptyStageMap)
        ));
    }

    #[test]
    fn test_bad_stage_index_rejected() {
        assert!(matches!(
            PolarCode::new(vec![kernel_arikan()], vec![0, 1]),
            Err(ConstructionError::BadStageIndex { .. })
        ));
    }
}
