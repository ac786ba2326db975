//! Convolution kernel family for the RVV benchmark harness
//!
//! Three interchangeable ways to compute an NCHW convolution:
//!
//! * [`cpu::conv2d_direct`], the six-loop reference every other path is
//!   checked against;
//! * [`cpu::conv2d_im2col_gemm`], im2col lowering followed by a blocked GEMM;
//! * [`cpu::conv2d_3x3_accumulate`], a specialized single-plane 3×3 stencil
//!   summed over input channels.
//!
//! Each has a scalar flavour and a vector flavour driven in
//! [`LaneWidth`]-sized steps.

use rvvbench_common::{Conv2dShape, GemmBlocking, KernelError, LaneWidth, Result, RvvBenchError};
use std::sync::OnceLock;

pub mod cpu;

pub use cpu::{Conv3x3Plane, GemmDims, StencilStrategy, Variant};

/// Kernel provider trait
pub trait ConvKernel: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;

    /// Blocking this provider uses for its GEMM by default.
    fn default_blocking(&self) -> GemmBlocking;

    fn conv2d(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
    ) -> Result<()>;

    fn conv2d_im2col(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        bias: Option<&[f32]>,
        output: &mut [f32],
        blocking: &GemmBlocking,
    ) -> Result<()>;

    fn im2col(&self, shape: &Conv2dShape, image: &[f32], col: &mut [f32]) -> Result<()>;

    fn gemm(
        &self,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        dims: GemmDims,
        blocking: &GemmBlocking,
    ) -> Result<()>;

    fn conv3x3(
        &self,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
        plane: Conv3x3Plane,
    ) -> Result<()>;

    fn conv3x3_accumulate(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
    ) -> Result<()>;
}

/// Scalar reference provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernel;

impl ConvKernel for ScalarKernel {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn default_blocking(&self) -> GemmBlocking {
        GemmBlocking::SCALAR
    }

    fn conv2d(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
    ) -> Result<()> {
        cpu::conv2d_direct(shape, input, kernel, output)
    }

    fn conv2d_im2col(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        bias: Option<&[f32]>,
        output: &mut [f32],
        blocking: &GemmBlocking,
    ) -> Result<()> {
        cpu::conv2d_im2col_gemm(shape, input, kernel, bias, output, blocking, Variant::Scalar)
    }

    fn im2col(&self, shape: &Conv2dShape, image: &[f32], col: &mut [f32]) -> Result<()> {
        cpu::im2col(shape, image, col)
    }

    fn gemm(
        &self,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        dims: GemmDims,
        blocking: &GemmBlocking,
    ) -> Result<()> {
        cpu::gemm_blocked(a, b, c, dims, blocking)
    }

    fn conv3x3(
        &self,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
        plane: Conv3x3Plane,
    ) -> Result<()> {
        cpu::conv3x3(input, kernel, output, plane)
    }

    fn conv3x3_accumulate(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
    ) -> Result<()> {
        cpu::conv2d_3x3_accumulate(shape, input, kernel, output, StencilStrategy::SCALAR)
    }
}

/// Provider that drives every kernel in `lanes`-wide steps.
#[derive(Debug, Clone, Copy)]
pub struct VectorKernel {
    lanes: LaneWidth,
}

impl VectorKernel {
    pub const fn new(lanes: LaneWidth) -> Self {
        Self { lanes }
    }

    pub const fn lanes(&self) -> LaneWidth {
        self.lanes
    }
}

impl ConvKernel for VectorKernel {
    fn name(&self) -> &'static str {
        self.lanes.variant_name()
    }

    fn is_available(&self) -> bool {
        // Strip-mined loops are portable; every width runs on any host.
        true
    }

    fn default_blocking(&self) -> GemmBlocking {
        GemmBlocking::VECTOR
    }

    fn conv2d(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
    ) -> Result<()> {
        cpu::conv2d_direct_vector(shape, input, kernel, output, self.lanes)
    }

    fn conv2d_im2col(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        bias: Option<&[f32]>,
        output: &mut [f32],
        blocking: &GemmBlocking,
    ) -> Result<()> {
        let variant = Variant::Vector(self.lanes);
        cpu::conv2d_im2col_gemm(shape, input, kernel, bias, output, blocking, variant)
    }

    fn im2col(&self, shape: &Conv2dShape, image: &[f32], col: &mut [f32]) -> Result<()> {
        cpu::im2col_vector(shape, image, col, self.lanes)
    }

    fn gemm(
        &self,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        dims: GemmDims,
        blocking: &GemmBlocking,
    ) -> Result<()> {
        cpu::gemm_blocked_vector(a, b, c, dims, blocking, self.lanes)
    }

    fn conv3x3(
        &self,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
        plane: Conv3x3Plane,
    ) -> Result<()> {
        cpu::conv3x3_vector(input, kernel, output, plane, self.lanes)
    }

    fn conv3x3_accumulate(
        &self,
        shape: &Conv2dShape,
        input: &[f32],
        kernel: &[f32],
        output: &mut [f32],
    ) -> Result<()> {
        let strategy = StencilStrategy::vector(self.lanes);
        cpu::conv2d_3x3_accumulate(shape, input, kernel, output, strategy)
    }
}

/// Kernel manager for selecting kernels with cached selection
pub struct KernelManager {
    providers: Vec<Box<dyn ConvKernel>>,
    selected: OnceLock<usize>,
}

impl KernelManager {
    /// Providers ordered by preference: widest vector first, scalar last.
    pub fn new() -> Self {
        let mut providers: Vec<Box<dyn ConvKernel>> = LaneWidth::ALL
            .iter()
            .rev()
            .map(|&w| Box::new(VectorKernel::new(w)) as Box<dyn ConvKernel>)
            .collect();
        providers.push(Box::new(ScalarKernel));

        Self { providers, selected: OnceLock::new() }
    }

    /// Select the best available provider, caching the choice.
    pub fn select_best(&self) -> Result<&dyn ConvKernel> {
        let idx = self.selected.get_or_init(|| {
            for (i, provider) in self.providers.iter().enumerate() {
                if provider.is_available() {
                    log::info!("Selected kernel provider: {}", provider.name());
                    return i;
                }
            }
            log::error!("No available kernel provider found");
            self.providers.len()
        });

        self.providers
            .get(*idx)
            .map(|p| p.as_ref())
            .ok_or(RvvBenchError::Kernel(KernelError::NoProvider))
    }

    pub fn selected_provider_name(&self) -> Option<&'static str> {
        self.selected.get().and_then(|&idx| self.providers.get(idx)).map(|p| p.name())
    }

    pub fn list_available_providers(&self) -> Vec<&'static str> {
        self.providers.iter().filter(|p| p.is_available()).map(|p| p.name()).collect()
    }

    /// Look a provider up by name (`"scalar"`, `"e32m4"`, ...).
    pub fn get(&self, name: &str) -> Result<&dyn ConvKernel> {
        self.providers
            .iter()
            .find(|p| p.name() == name && p.is_available())
            .map(|p| p.as_ref())
            .ok_or(RvvBenchError::Kernel(KernelError::NoProvider))
    }

    /// Force reselection of kernel provider (for testing)
    #[cfg(test)]
    pub fn reset_selection(&mut self) {
        self.selected = OnceLock::new();
    }
}

impl Default for KernelManager {
    fn default() -> Self {
        Self::new()
    }
}
