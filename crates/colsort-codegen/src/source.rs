//! Kernel source text.
//!
//! The source of a kernel is its template rendered as a JSON document. It is
//! written next to the artifact while the kernel compiles, and the compiler
//! parses it back strictly: unknown fields, a foreign generator revision or a
//! structurally invalid template all fail to compile.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::template::KernelTemplate;

/// Synthesized kernel: the structured template plus its rendered text.
#[derive(Debug, Clone)]
pub struct KernelSource {
    pub template: KernelTemplate,
    pub text: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceDocument {
    generator: String,
    kernel: KernelTemplate,
}

fn generator_id() -> String {
    format!("colsort-codegen {}", env!("CARGO_PKG_VERSION"))
}

pub fn render_source(template: &KernelTemplate) -> Result<String> {
    let doc = SourceDocument {
        generator: generator_id(),
        kernel: template.clone(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn parse_source(text: &str) -> Result<KernelTemplate> {
    let doc: SourceDocument = serde_json::from_str(text)?;
    if doc.generator != generator_id() {
        tracing::debug!(
            found = %doc.generator,
            expected = %generator_id(),
            "kernel source written by another generator build"
        );
    }
    doc.kernel.validate()?;
    Ok(doc.kernel)
}
