//! Compilers that turn kernel source text into artifact bytes.

use colsort_codegen::parse_source;

use crate::artifact;
use crate::error::{CacheError, Result};

/// Turns kernel source into a loadable artifact.
///
/// The cache owns a boxed toolchain, so alternative compilers (or failing
/// ones in tests) plug in through [`crate::KernelCache::with_toolchain`].
pub trait Toolchain: Send + Sync {
    fn name(&self) -> &'static str;

    fn compile(&self, signature: &str, source: &str) -> Result<Vec<u8>>;
}

/// Default toolchain: strict parse, structural validation, then seal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateCompiler;

impl Toolchain for TemplateCompiler {
    fn name(&self) -> &'static str {
        "template"
    }

    fn compile(&self, signature: &str, source: &str) -> Result<Vec<u8>> {
        let compile_err = |reason: String| CacheError::Compile {
            signature: signature.to_string(),
            reason,
        };
        let template = parse_source(source).map_err(|e| compile_err(e.to_string()))?;
        let bytes = artifact::encode(&template).map_err(|e| compile_err(e.to_string()))?;
        if bytes.is_empty() {
            return Err(compile_err("toolchain produced no output".into()));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_source_is_a_compile_error() {
        let err = TemplateCompiler.compile("sig", "{ not json").unwrap_err();
        assert!(matches!(err, CacheError::Compile { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = TemplateCompiler
            .compile("sig", r#"{"generator":"x","kernel":null,"extra":1}"#)
            .unwrap_err();
        assert!(matches!(err, CacheError::Compile { .. }));
    }
}
