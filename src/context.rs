use crate::FluidError;
use crate::pass::Pass;
use glam::Vec4;

/// Allocation request for one field buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

impl FieldDescriptor {
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// The host-owned rendering capability: allocate render targets and run a
/// full-grid pass into one of them.
///
/// Implementations must finish (or at least order) each pass before the next
/// one reads its output. The pipeline passes the context into every call and
/// never stores it.
pub trait RenderContext {
    type Field;

    fn create_field(&mut self, desc: &FieldDescriptor) -> Result<Self::Field, FluidError>;

    fn run_pass(
        &mut self,
        pass: &Pass<'_, Self::Field>,
        target: &mut Self::Field,
    ) -> Result<(), FluidError>;

    /// Overwrites every texel of `field`, row-major from the bottom row.
    fn upload(&mut self, field: &mut Self::Field, texels: &[Vec4]) -> Result<(), FluidError>;

    fn release_field(&mut self, field: Self::Field) {
        drop(field);
    }
}
