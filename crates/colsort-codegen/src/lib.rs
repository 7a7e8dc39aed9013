#![forbid(unsafe_code)]
//! colsort-codegen: synthesis of specialized sort kernels.
//!
//! A sort request is lowered into a [`KernelTemplate`]: one [`FieldSlot`]
//! fragment per output column, a recursive comparator chain, a null
//! placement rule and a sort dispatch. The template renders to kernel source
//! text, which `colsort-cache` compiles into an artifact and
//! `colsort-kernel` instantiates against its generic containers.

pub mod error;
pub mod source;
pub mod synth;
pub mod template;

pub use error::{Result, SynthError};
pub use source::{parse_source, render_source, KernelSource};
pub use synth::synthesize;
pub use template::{
    CompareStep, FieldSlot, KernelPolicy, KernelTemplate, Placement, RegionBase, SortCall,
    Strategy, GENERATOR_REVISION,
};
