//! Single and double-buffered render targets.

use crate::FluidError;
use crate::context::{FieldDescriptor, RenderContext};
use crate::pass::Pass;

/// One render target that is fully rewritten by every pass targeting it.
///
/// The pass may only sample other fields; borrowing rules keep it from
/// naming this buffer as an input.
#[derive(Debug)]
pub struct FieldBuffer<F> {
    field: F,
    desc: FieldDescriptor,
}

impl<F> FieldBuffer<F> {
    pub fn new<C>(ctx: &mut C, desc: FieldDescriptor) -> Result<Self, FluidError>
    where
        C: RenderContext<Field = F>,
    {
        Ok(Self {
            field: ctx.create_field(&desc)?,
            desc,
        })
    }

    pub fn read(&self) -> &F {
        &self.field
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.desc
    }

    pub fn write<C>(&mut self, ctx: &mut C, pass: Pass<'_, F>) -> Result<&F, FluidError>
    where
        C: RenderContext<Field = F>,
    {
        ctx.run_pass(&pass, &mut self.field)?;
        Ok(&self.field)
    }

    pub fn upload<C>(&mut self, ctx: &mut C, texels: &[glam::Vec4]) -> Result<(), FluidError>
    where
        C: RenderContext<Field = F>,
    {
        ctx.upload(&mut self.field, texels)
    }

    pub fn release<C>(self, ctx: &mut C)
    where
        C: RenderContext<Field = F>,
    {
        ctx.release_field(self.field);
    }
}

/// Two render targets where every pass reads `read` and writes the other one,
/// then the roles swap.
#[derive(Debug)]
pub struct PingPong<F> {
    buffers: [F; 2],
    read_index: usize,
    desc: FieldDescriptor,
}

impl<F> PingPong<F> {
    pub fn new<C>(ctx: &mut C, desc: FieldDescriptor) -> Result<Self, FluidError>
    where
        C: RenderContext<Field = F>,
    {
        let first = ctx.create_field(&desc)?;
        let second = match ctx.create_field(&desc) {
            Ok(field) => field,
            Err(err) => {
                ctx.release_field(first);
                return Err(err);
            }
        };
        Ok(Self {
            buffers: [first, second],
            read_index: 0,
            desc,
        })
    }

    pub fn read(&self) -> &F {
        &self.buffers[self.read_index]
    }

    pub fn write_target(&self) -> &F {
        &self.buffers[1 - self.read_index]
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.desc
    }

    /// Runs the pass built by `program` from the current `read` buffer into
    /// the other buffer and swaps, returning the fresh `read`.
    pub fn write<'s, C, P>(&'s mut self, ctx: &mut C, program: P) -> Result<&'s F, FluidError>
    where
        C: RenderContext<Field = F>,
        P: FnOnce(&'s F) -> Pass<'s, F>,
    {
        let (head, tail) = self.buffers.split_at_mut(1);
        let (read, write) = if self.read_index == 0 {
            (&head[0], &mut tail[0])
        } else {
            (&tail[0], &mut head[0])
        };

        let pass = program(read);
        ctx.run_pass(&pass, write)?;
        self.read_index = 1 - self.read_index;
        Ok(write)
    }

    /// Overwrites the current `read` buffer, e.g. to seed an initial state.
    pub fn upload<C>(&mut self, ctx: &mut C, texels: &[glam::Vec4]) -> Result<(), FluidError>
    where
        C: RenderContext<Field = F>,
    {
        ctx.upload(&mut self.buffers[self.read_index], texels)
    }

    pub fn release<C>(self, ctx: &mut C)
    where
        C: RenderContext<Field = F>,
    {
        let [first, second] = self.buffers;
        ctx.release_field(first);
        ctx.release_field(second);
    }
}
